use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_forwarder::config::Config;
use lead_forwarder::handlers::AppState;
use lead_forwarder::routes;

/// Main entry point for the application.
///
/// Initializes tracing, loads the configuration, builds the RD CRM client and
/// the router, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_forwarder=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let port = config.port;
    let app_state = Arc::new(AppState::new(config)?);
    tracing::info!("✓ RD CRM client initialized: {}", app_state.config.crm_base_url);

    let app = routes::router(app_state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses feed the per-IP rate limiter when no proxy headers exist
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
