use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_MAX_AGE},
        StatusCode,
    },
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::crm_client::RdCrmClient;
use crate::errors::AppError;
use crate::forwarder::LeadForwarder;
use crate::models::{ErrorResponse, ForwardResponse, LeadSubmission, ValidationErrorResponse};
use crate::normalizer;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration, resolved once at startup.
    pub config: Config,
    /// Client for the RD Station CRM API.
    pub crm: RdCrmClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let crm = RdCrmClient::new(&config)?;
        Ok(Self { config, crm })
    }
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-forwarder",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/framer-rdcrm
///
/// Receives a form submission, normalizes it and forwards it to RD CRM as a
/// contact and, when a deal stage is configured, a deal.
///
/// The body may be JSON or form encoded, optionally wrapped in a `data`,
/// `fields`, `body` or `payload` envelope.
#[utoipa::path(
    post,
    path = "/api/framer-rdcrm",
    tag = "leads",
    request_body(
        content = LeadSubmission,
        description = "Lead fields, as JSON or form data, optionally enveloped",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Lead forwarded", body = ForwardResponse),
        (status = 400, description = "name or email missing", body = ValidationErrorResponse),
        (status = 500, description = "Configuration or CRM failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(name = "lead", skip_all, fields(submission_id = %Uuid::new_v4()))]
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ForwardResponse>, AppError> {
    tracing::info!("📨 Received lead submission ({} bytes)", body.len());

    let lead = normalizer::normalize(&body)?;
    tracing::info!(
        "Lead normalized: email#{} product={:?}",
        lead.email_fingerprint(),
        lead.product
    );

    let start = std::time::Instant::now();
    let outcome = LeadForwarder::new(&state.config, &state.crm)
        .forward(&lead)
        .await?;

    tracing::info!(
        "✅ Lead forwarded in {}ms (deal: {})",
        start.elapsed().as_millis(),
        outcome.deal.is_some()
    );

    Ok(Json(outcome.into()))
}

/// OPTIONS /api/framer-rdcrm
///
/// CORS preflight. `Access-Control-Allow-Origin` is added to every response
/// by the router, so only the preflight-specific headers are set here.
#[utoipa::path(
    options,
    path = "/api/framer-rdcrm",
    tag = "leads",
    responses((status = 204, description = "CORS preflight"))
)]
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Authorization"),
            (ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}
