use axum::{
    body,
    extract::DefaultBodyLimit,
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{self, AppState};
use crate::models::{ErrorResponse, ForwardResponse, LeadFields, LeadSubmission, ValidationErrorResponse};

pub const LEAD_ROUTE: &str = "/api/framer-rdcrm";

/// Upper bound on a rejection body read back for rewrapping.
const REJECTION_BODY_LIMIT: usize = 4096;

#[derive(OpenApi)]
#[openapi(
    info(title = "Lead Forwarder", description = "Relays website form leads to RD Station CRM"),
    paths(handlers::submit_lead, handlers::preflight, handlers::health),
    components(schemas(
        LeadSubmission,
        LeadFields,
        ForwardResponse,
        ValidationErrorResponse,
        ErrorResponse
    )),
    tags(
        (name = "leads", description = "Lead intake"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Builds the application router.
///
/// The lead route gets the body size limit and, when enabled, per-IP rate
/// limiting. `/health` and the docs bypass both. Every response carries
/// `Access-Control-Allow-Origin: *`. Rejections raised by the lead route's
/// middleware are rewrapped as JSON errors.
pub fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let config = &state.config;

    let mut lead_routes = Router::new()
        .route(LEAD_ROUTE, post(handlers::submit_lead).options(handlers::preflight))
        .layer(
            ServiceBuilder::new()
                // The tower-http limit replaces axum's fixed default
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(config.max_body_bytes)),
        );

    if config.rate_limit_enabled {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(config.rate_limit_replenish_secs)
                .burst_size(config.rate_limit_burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
        );
        lead_routes = lead_routes.layer(GovernorLayer {
            config: governor_conf,
        });
        tracing::info!(
            "Rate limiting enabled: 1 request per {}s per IP, burst of {}",
            config.rate_limit_replenish_secs,
            config.rate_limit_burst
        );
    }

    lead_routes = lead_routes.layer(middleware::map_response(json_rejections));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(lead_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ));

    Ok(app)
}

/// Rewrites non-JSON error responses (body limit, rate limit, extractor
/// rejections) as `{ "error": ... }`, keeping status and headers.
async fn json_rejections(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));
    if is_json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, rejection_body) = response.into_parts();
    let detail = body::to_bytes(rejection_body, REJECTION_BODY_LIMIT)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    let error = if detail.is_empty() {
        status.canonical_reason().unwrap_or("Request rejected").to_string()
    } else {
        detail
    };

    parts.headers.remove(CONTENT_TYPE);
    parts.headers.remove(CONTENT_LENGTH);
    let mut rewrapped = (status, Json(ErrorResponse { error })).into_response();
    rewrapped.headers_mut().extend(parts.headers);
    rewrapped
}
