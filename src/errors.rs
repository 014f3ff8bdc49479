use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use crate::models::{ErrorResponse, LeadFields, ValidationErrorResponse};

/// Message returned to the caller when `name` or `email` is missing.
pub const MISSING_FIELDS_MESSAGE: &str = "Campos obrigatórios: name e email";

/// Message returned for failures whose details are only logged.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Erro inesperado";

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// `name` or `email` was empty after normalization. Carries whatever
    /// was extracted so it can be echoed back.
    MissingRequiredField(LeadFields),
    /// A required setting (e.g. the CRM token) is not configured.
    ConfigurationMissing(String),
    /// The CRM answered with a non-2xx status.
    UpstreamError {
        method: String,
        path: String,
        status: u16,
        body: String,
    },
    /// The CRM could not be reached (connect error, timeout, ...).
    UpstreamUnavailable(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingRequiredField(_) => write!(f, "{}", MISSING_FIELDS_MESSAGE),
            AppError::ConfigurationMissing(setting) => {
                write!(f, "Configuration missing: {} is not set", setting)
            }
            AppError::UpstreamError {
                method,
                path,
                status,
                body,
            } => write!(f, "RD CRM {} {} -> {} {}", method, path, status, body),
            AppError::UpstreamUnavailable(msg) => write!(f, "RD CRM unreachable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingRequiredField(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each variant to its HTTP status and JSON body, logging by severity.
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            AppError::MissingRequiredField(received) => {
                tracing::warn!("Rejected submission: name or email missing");
                (
                    status,
                    Json(ValidationErrorResponse {
                        error: MISSING_FIELDS_MESSAGE.to_string(),
                        received,
                    }),
                )
                    .into_response()
            }
            AppError::InternalError(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    status,
                    Json(ErrorResponse {
                        error: UNEXPECTED_ERROR_MESSAGE.to_string(),
                    }),
                )
                    .into_response()
            }
            other => {
                // Configuration and upstream details go back to the caller
                // verbatim so the form owner can diagnose the deployment.
                // CRM bodies may echo the submitted email, so logs omit them.
                match &other {
                    AppError::UpstreamError {
                        method,
                        path,
                        status,
                        body,
                    } => tracing::error!(
                        "RD CRM {} {} -> {} ({} byte body)",
                        method,
                        path,
                        status,
                        body.len()
                    ),
                    _ => tracing::error!("{}", other),
                }
                (
                    status,
                    Json(ErrorResponse {
                        error: other.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::MissingRequiredField(LeadFields::default()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ConfigurationMissing("RD_CRM_TOKEN".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::UpstreamUnavailable("timeout".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_error_message_carries_status_and_body() {
        let err = AppError::UpstreamError {
            method: "POST".to_string(),
            path: "/contacts".to_string(),
            status: 422,
            body: r#"{"errors":"email invalid"}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"RD CRM POST /contacts -> 422 {"errors":"email invalid"}"#
        );
    }

    #[test]
    fn test_configuration_missing_names_the_setting() {
        let err = AppError::ConfigurationMissing("RD_CRM_TOKEN".to_string());
        assert!(err.to_string().contains("RD_CRM_TOKEN"));
    }
}
