//! Webhook endpoints
//!
//! Both endpoints read the raw body bytes before any JSON parsing: the
//! provider signatures are computed over the exact bytes. Once a
//! signature verifies, the endpoint answers 200 regardless of handler
//! outcome; handler failures are logged for manual reconciliation so
//! providers do not mount retry storms against effects that are
//! idempotent anyway. Signature failures are the exception: 400 (card)
//! and 401 (crypto) before any store mutation.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use atelier_payments::CryptoEvent;

use crate::state::AppState;

fn received() -> Response {
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

/// POST /api/stripe/webhook
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payments = match state.payments_service() {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    let Some(signature) = headers.get("stripe-signature").and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Stripe webhook without signature header");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Signature manquante" })),
        )
            .into_response();
    };

    let Ok(payload) = std::str::from_utf8(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Corps invalide" })),
        )
            .into_response();
    };

    let event = match payments.webhooks.verify_stripe_event(payload, signature) {
        Ok(event) => event,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Signature invalide" })),
            )
                .into_response();
        }
    };

    tracing::info!(event_type = %event.type_, event_id = %event.id, "Stripe webhook received");

    // Signature verified and event accepted: acknowledge whatever the
    // handler does, logging failures for reconciliation.
    if let Err(e) = payments.webhooks.handle_stripe_event(event).await {
        tracing::error!(error = %e, "Stripe webhook handler failed");
    }

    received()
}

/// POST /api/crypto/webhook
pub async fn crypto_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payments = match state.payments_service() {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    let signature = headers
        .get("x-cc-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if payments
        .webhooks
        .verify_crypto_signature(&body, signature)
        .is_err()
    {
        tracing::warn!("Invalid crypto webhook signature");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Signature invalide" })),
        )
            .into_response();
    }

    let event = match CryptoEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed crypto webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Corps invalide" })),
            )
                .into_response();
        }
    };

    if let Err(e) = payments.webhooks.handle_crypto_event(event).await {
        tracing::error!(error = %e, "Crypto webhook handler failed");
    }

    received()
}
