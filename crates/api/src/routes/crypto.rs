//! Crypto checkout endpoints (Coinbase Commerce)

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use atelier_payments::CryptoCustomer;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoChargeRequest {
    pub package_type: String,
    pub customer_data: CryptoCustomer,
}

/// POST /api/crypto/coinbase - create a crypto charge
pub async fn create_charge(
    State(state): State<AppState>,
    Json(request): Json<CryptoChargeRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let payments = state.payments_service()?;

    if request.customer_data.email.is_empty() {
        return Err(ApiError::BadRequest("Email client requis".to_string()));
    }

    let charge = payments
        .checkout
        .create_crypto_charge(&request.package_type, &request.customer_data)
        .await?;

    Ok(Json(json!({ "success": true, "charge": charge })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeQuery {
    pub charge_id: String,
}

/// GET /api/crypto/coinbase - fetch a charge by id
pub async fn get_charge(
    State(state): State<AppState>,
    Query(query): Query<ChargeQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let payments = state.payments_service()?;

    if query.charge_id.is_empty() {
        return Err(ApiError::BadRequest("Charge ID requis".to_string()));
    }

    let charge = payments.checkout.get_crypto_charge(&query.charge_id).await?;

    Ok(Json(json!({ "success": true, "charge": charge })))
}
