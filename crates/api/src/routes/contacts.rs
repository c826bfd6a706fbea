//! Contact (lead) admin endpoints

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use atelier_shared::types::ContactStatus;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct ContactRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub company: String,
    pub message: String,
    pub project_type: String,
    pub budget_cents: i64,
    pub status: String,
    pub source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const CONTACT_COLUMNS: &str = "id, email, name, phone, company, message, project_type, \
     budget_cents, status, source, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/contacts
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<ContactStatus>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let contacts: Vec<ContactRow> = sqlx::query_as(&format!(
        r#"
        SELECT {CONTACT_COLUMNS}
        FROM contacts
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
        sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE ($1::text IS NULL OR status = $1)")
            .bind(&status)
            .fetch_one(&state.pool)
            .await?;

    Ok(Json(json!({ "contacts": contacts, "total": total.0 })))
}

/// GET /api/contacts/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ContactRow>> {
    let contact: Option<ContactRow> =
        sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    contact
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Contact".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// PUT /api/contacts/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<ContactRow>> {
    auth.ensure_can_edit()?;

    let status = request
        .status
        .parse::<ContactStatus>()
        .map_err(ApiError::BadRequest)?;

    let contact: Option<ContactRow> = sqlx::query_as(&format!(
        r#"
        UPDATE contacts
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {CONTACT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(&state.pool)
    .await?;

    contact
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Contact".to_string()))
}
