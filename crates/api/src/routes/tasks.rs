//! Project task endpoints

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use atelier_shared::types::{TaskPriority, TaskStatus};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub estimated_hours: i32,
    pub position: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const TASK_COLUMNS: &str = "id, project_id, title, description, status, priority, \
     estimated_hours, position, created_at, updated_at";

/// GET /api/projects/{id}/tasks
pub async fn list(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskRow>>> {
    let tasks: Vec<TaskRow> = sqlx::query_as(&format!(
        "SELECT {TASK_COLUMNS} FROM project_tasks WHERE project_id = $1 \
         ORDER BY position ASC, created_at ASC"
    ))
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(tasks))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<String>,
    #[serde(default)]
    pub estimated_hours: i32,
}

/// POST /api/projects/{id}/tasks
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskRow>)> {
    auth.ensure_can_edit()?;

    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Le titre est requis".to_string()));
    }

    let priority = match &request.priority {
        Some(raw) => raw.parse::<TaskPriority>().map_err(ApiError::BadRequest)?,
        None => TaskPriority::Medium,
    };

    let project_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(&state.pool)
        .await?;
    if project_exists.is_none() {
        return Err(ApiError::NotFound("Projet".to_string()));
    }

    let task: TaskRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO project_tasks (project_id, title, description, priority, estimated_hours, position)
        VALUES ($1, $2, $3, $4, $5,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM project_tasks WHERE project_id = $1))
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(project_id)
    .bind(request.title.trim())
    .bind(&request.description)
    .bind(priority.as_str())
    .bind(request.estimated_hours)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub estimated_hours: Option<i32>,
    pub position: Option<i32>,
}

/// PUT /api/tasks/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskRow>> {
    auth.ensure_can_edit()?;

    let status = match &request.status {
        Some(raw) => Some(
            raw.parse::<TaskStatus>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    let priority = match &request.priority {
        Some(raw) => Some(
            raw.parse::<TaskPriority>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };

    let task: Option<TaskRow> = sqlx::query_as(&format!(
        r#"
        UPDATE project_tasks SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            priority = COALESCE($5, priority),
            estimated_hours = COALESCE($6, estimated_hours),
            position = COALESCE($7, position),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&status)
    .bind(&priority)
    .bind(request.estimated_hours)
    .bind(request.position)
    .fetch_optional(&state.pool)
    .await?;

    task.map(Json)
        .ok_or_else(|| ApiError::NotFound("Tache".to_string()))
}

/// DELETE /api/tasks/{id}
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.ensure_can_edit()?;

    let rows = sqlx::query("DELETE FROM project_tasks WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(ApiError::NotFound("Tache".to_string()));
    }

    Ok(Json(json!({ "success": true })))
}
