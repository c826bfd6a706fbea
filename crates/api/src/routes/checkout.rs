//! Card checkout endpoints (Stripe)

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use atelier_payments::CustomerInfo;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub package_id: String,
    pub customer_info: CustomerInfo,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// POST /api/stripe/checkout - create a checkout session
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let payments = state.payments_service()?;

    if request.customer_info.email.is_empty() {
        return Err(ApiError::BadRequest("Email client requis".to_string()));
    }

    let success_url = request.success_url.unwrap_or_else(|| {
        format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
            state.config.site_url
        )
    });
    let cancel_url = request
        .cancel_url
        .unwrap_or_else(|| format!("{}/", state.config.site_url));

    let response = payments
        .checkout
        .create_card_checkout(
            &request.package_id,
            &request.customer_info,
            &success_url,
            &cancel_url,
        )
        .await?;

    Ok(Json(json!({
        "sessionId": response.session_id,
        "url": response.url,
        "customer": {
            "id": response.customer_id,
            "email": response.customer_email,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

/// GET /api/stripe/checkout - fetch a sanitized session
pub async fn get_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let payments = state.payments_service()?;

    let session = payments
        .checkout
        .retrieve_card_session(&query.session_id)
        .await?;

    Ok(Json(serde_json::to_value(session).map_err(|e| {
        ApiError::Internal(format!("session serialization failed: {e}"))
    })?))
}
