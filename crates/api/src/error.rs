//! API error type and response mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use atelier_payments::PaymentsError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(serde_json::Value),

    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("too many requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("payments are not configured")]
    PaymentsUnavailable,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Field-level validation failure: `{"ok":false,"errors":{field:msg}}`.
    pub fn validation(errors: serde_json::Value) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<PaymentsError> for ApiError {
    fn from(e: PaymentsError) -> Self {
        match e {
            PaymentsError::InvalidInput(msg) => ApiError::BadRequest(msg),
            PaymentsError::NotFound(what) => ApiError::NotFound(what),
            PaymentsError::WebhookSignatureInvalid => ApiError::Unauthorized,
            PaymentsError::Database(msg) => ApiError::Internal(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "errors": errors }),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Non autorise" }),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, json!({ "error": "Acces refuse" })),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{what} non trouve") }),
            ),
            ApiError::RateLimited {
                retry_after_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error": "Trop de requetes",
                    "retry_after_seconds": retry_after_seconds,
                }),
            ),
            ApiError::PaymentsUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "Paiements indisponibles" }),
            ),
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Erreur serveur" }),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Erreur serveur" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payments_invalid_input_maps_to_400() {
        let err: ApiError = PaymentsError::InvalidInput("unknown package: x".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_signature_failure_maps_to_unauthorized() {
        let err: ApiError = PaymentsError::WebhookSignatureInvalid.into();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
