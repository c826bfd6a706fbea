//! Payments error types

use thiserror::Error;

pub type PaymentsResult<T> = Result<T, PaymentsError>;

#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Stripe API error: {0}")]
    StripeApi(String),

    #[error("Coinbase Commerce API error: {0}")]
    CoinbaseApi(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for PaymentsError {
    fn from(e: sqlx::Error) -> Self {
        PaymentsError::Database(e.to_string())
    }
}

impl From<stripe::StripeError> for PaymentsError {
    fn from(e: stripe::StripeError) -> Self {
        PaymentsError::StripeApi(e.to_string())
    }
}

impl From<reqwest::Error> for PaymentsError {
    fn from(e: reqwest::Error) -> Self {
        PaymentsError::CoinbaseApi(e.to_string())
    }
}
