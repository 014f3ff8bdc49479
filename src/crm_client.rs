use reqwest::header::{AUTHORIZATION, CACHE_CONTROL};
use serde_json::Value;

use crate::config::{AuthMode, Config};
use crate::errors::AppError;

pub const CONTACTS_PATH: &str = "/contacts";
pub const DEALS_PATH: &str = "/deals";

/// Client for the RD Station CRM REST API.
///
/// Built once per process and shared across requests; `reqwest::Client`
/// keeps its own connection pool, so cloning is cheap.
#[derive(Clone)]
pub struct RdCrmClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    auth_mode: AuthMode,
}

impl RdCrmClient {
    /// Creates a new `RdCrmClient` from the process configuration.
    ///
    /// A missing token is not an error here; every call made without one
    /// fails with `ConfigurationMissing` instead.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.crm_timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create RD CRM client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.crm_base_url.trim_end_matches('/').to_string(),
            token: config.crm_token.clone(),
            auth_mode: config.auth_mode,
        })
    }

    /// Authenticated JSON POST to `path`, relative to the base URL.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The response body. Bodies that are not JSON come back
    ///   as a JSON string, an empty body as `null`.
    /// * `Err(AppError::ConfigurationMissing)` - No token configured; nothing was sent.
    /// * `Err(AppError::UpstreamError)` - Non-2xx status, with the raw body.
    /// * `Err(AppError::UpstreamUnavailable)` - Transport failure or timeout.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AppError::ConfigurationMissing("RD_CRM_TOKEN".to_string()))?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("RD CRM POST {}", path);

        let request = self
            .client
            .post(&url)
            .header(CACHE_CONTROL, "no-store")
            .json(body);

        let request = match self.auth_mode {
            AuthMode::Header => request.header(AUTHORIZATION, format!("Token token={}", token)),
            AuthMode::Query => request.query(&[("token", token)]),
        };

        let response = request.send().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("POST {} failed: {}", path, e.without_url()))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!(
                "Failed to read response for POST {}: {}",
                path,
                e.without_url()
            ))
        })?;

        if !status.is_success() {
            return Err(AppError::UpstreamError {
                method: "POST".to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::debug!("RD CRM POST {} -> {}", path, status);
        Ok(parse_body(&text))
    }

    pub async fn create_contact(&self, body: &Value) -> Result<Value, AppError> {
        self.post(CONTACTS_PATH, body).await
    }

    pub async fn create_deal(&self, body: &Value) -> Result<Value, AppError> {
        self.post(DEALS_PATH, body).await
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| {
        tracing::debug!("RD CRM returned a non-JSON body; keeping it as text");
        Value::String(text.to_string())
    })
}

/// Extracts the contact identifier from a contact response.
///
/// Tries `id`, `_id`, then the same keys under `contact`, accepting either
/// strings or integers.
pub fn contact_id(response: &Value) -> Option<String> {
    let candidates = [
        response.get("id"),
        response.get("_id"),
        response.get("contact").and_then(|c| c.get("id")),
        response.get("contact").and_then(|c| c.get("_id")),
    ];

    candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
