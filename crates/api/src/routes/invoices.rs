//! Invoice endpoints
//!
//! Read side of the webhook-maintained invoices, plus a manual status
//! override for reconciliation and the invariant check endpoint.

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use atelier_shared::types::InvoiceStatus;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub number: String,
    pub project_id: Option<Uuid>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub status: String,
    pub external_charge_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const INVOICE_COLUMNS: &str = "id, number, project_id, subtotal_cents, tax_cents, total_cents, \
     currency, status, external_charge_id, due_date, paid_date, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/invoices
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<InvoiceStatus>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let invoices: Vec<InvoiceRow> = sqlx::query_as(&format!(
        r#"
        SELECT {INVOICE_COLUMNS}
        FROM invoices
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(&status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM invoices WHERE ($1::text IS NULL OR status = $1)")
            .bind(&status)
            .fetch_one(&state.pool)
            .await?;

    Ok(Json(json!({ "invoices": invoices, "total": total.0 })))
}

/// GET /api/invoices/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InvoiceRow>> {
    let invoice: Option<InvoiceRow> =
        sqlx::query_as(&format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    invoice
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Facture".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// PUT /api/invoices/{id}/status - manual reconciliation override
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<InvoiceRow>> {
    auth.ensure_can_edit()?;

    let status = request
        .status
        .parse::<InvoiceStatus>()
        .map_err(ApiError::BadRequest)?;

    let invoice: Option<InvoiceRow> = sqlx::query_as(&format!(
        r#"
        UPDATE invoices
        SET status = $2,
            paid_date = CASE WHEN $2 = 'PAID' THEN COALESCE(paid_date, NOW()) ELSE paid_date END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {INVOICE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(&state.pool)
    .await?;

    let Some(invoice) = invoice else {
        return Err(ApiError::NotFound("Facture".to_string()));
    };

    tracing::info!(
        invoice_id = %id,
        status = status.as_str(),
        changed_by = %auth.user_id,
        "Invoice status overridden"
    );

    Ok(Json(invoice))
}

/// GET /api/admin/invariants - run the payment consistency checks
pub async fn run_invariants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.ensure_admin()?;

    let payments = state.payments_service()?;
    let summary = payments.invariants.run_all_checks().await?;

    Ok(Json(serde_json::to_value(summary).map_err(|e| {
        ApiError::Internal(format!("summary serialization failed: {e}"))
    })?))
}
