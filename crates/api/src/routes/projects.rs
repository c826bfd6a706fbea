//! Project endpoints
//!
//! Public listing exposes only delivered projects flagged public, with a
//! sanitized client view. Everything else sits behind the session gate.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use atelier_shared::types::{ProjectStatus, ProjectType, TaskPriority};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub project_type: String,
    pub status: String,
    pub budget_cents: i64,
    pub timeline_days: i32,
    pub technologies: Vec<String>,
    pub features: Vec<String>,
    pub progress: i32,
    pub is_public: bool,
    pub repository_url: Option<String>,
    pub staging_url: Option<String>,
    pub production_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub delivery_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const PROJECT_COLUMNS: &str = r#"
    id, contact_id, user_id, title, description, type AS project_type, status,
    budget_cents, timeline_days, technologies, features, progress, is_public,
    repository_url, staging_url, production_url,
    start_date, end_date, delivery_date, created_at, updated_at
"#;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub project_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn validated_filters(query: &ListQuery) -> ApiResult<(Option<String>, Option<String>)> {
    let status = match &query.status {
        Some(raw) => Some(
            raw.parse::<ProjectStatus>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    let project_type = match &query.project_type {
        Some(raw) => Some(
            raw.parse::<ProjectType>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    Ok((status, project_type))
}

/// GET /api/projects - full listing for the admin area
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (status, project_type) = validated_filters(&query)?;
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let projects: Vec<ProjectRow> = sqlx::query_as(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM projects
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR type = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(&status)
    .bind(&project_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM projects
        WHERE ($1::text IS NULL OR status = $1)
          AND ($2::text IS NULL OR type = $2)
        "#,
    )
    .bind(&status)
    .bind(&project_type)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({ "projects": projects, "total": total.0 })))
}

#[derive(Debug, Serialize, FromRow)]
pub struct PublicProjectRow {
    id: Uuid,
    title: String,
    description: String,
    project_type: String,
    technologies: Vec<String>,
    features: Vec<String>,
    production_url: Option<String>,
    client_name: String,
    client_company: String,
    #[serde(with = "time::serde::rfc3339")]
    completed_at: OffsetDateTime,
}

/// GET /api/projects/public - delivered public projects, sanitized
pub async fn list_public(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (_, project_type) = validated_filters(&query)?;
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let projects: Vec<PublicProjectRow> = sqlx::query_as(
        r#"
        SELECT
            p.id, p.title, p.description, p.type AS project_type,
            p.technologies, p.features, p.production_url,
            c.name AS client_name, c.company AS client_company,
            p.updated_at AS completed_at
        FROM projects p
        JOIN contacts c ON c.id = p.contact_id
        WHERE p.status = 'DELIVERED'
          AND p.is_public = TRUE
          AND ($1::text IS NULL OR p.type = $1)
        ORDER BY p.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&project_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM projects p
        WHERE p.status = 'DELIVERED'
          AND p.is_public = TRUE
          AND ($1::text IS NULL OR p.type = $1)
        "#,
    )
    .bind(&project_type)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(json!({ "projects": projects, "total": total.0 })))
}

/// GET /api/projects/public/{id}
pub async fn get_public(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicProjectRow>> {
    let project: Option<PublicProjectRow> = sqlx::query_as(
        r#"
        SELECT
            p.id, p.title, p.description, p.type AS project_type,
            p.technologies, p.features, p.production_url,
            c.name AS client_name, c.company AS client_company,
            p.updated_at AS completed_at
        FROM projects p
        JOIN contacts c ON c.id = p.contact_id
        WHERE p.id = $1 AND p.status = 'DELIVERED' AND p.is_public = TRUE
        "#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    project
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Projet".to_string()))
}

/// GET /api/projects/{id} - full detail with contact, tasks, invoices
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let project: Option<ProjectRow> =
        sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;

    let Some(project) = project else {
        return Err(ApiError::NotFound("Projet".to_string()));
    };

    let contact: Option<super::contacts::ContactRow> = sqlx::query_as(
        "SELECT id, email, name, phone, company, message, project_type, budget_cents, \
         status, source, created_at, updated_at FROM contacts WHERE id = $1",
    )
    .bind(project.contact_id)
    .fetch_optional(&state.pool)
    .await?;

    let tasks: Vec<super::tasks::TaskRow> = sqlx::query_as(
        "SELECT id, project_id, title, description, status, priority, estimated_hours, \
         position, created_at, updated_at \
         FROM project_tasks WHERE project_id = $1 ORDER BY position ASC, created_at ASC",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let invoices: Vec<super::invoices::InvoiceRow> = sqlx::query_as(
        "SELECT id, number, project_id, subtotal_cents, tax_cents, total_cents, currency, \
         status, external_charge_id, due_date, paid_date, created_at, updated_at \
         FROM invoices WHERE project_id = $1 ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({
        "project": project,
        "contact": contact,
        "tasks": tasks,
        "invoices": invoices,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub contact_id: Uuid,
    #[serde(default)]
    pub budget_cents: i64,
    pub timeline_days: Option<i32>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// POST /api/projects
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectRow>)> {
    auth.ensure_can_edit()?;

    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Le titre est requis".to_string()));
    }
    let project_type = request
        .project_type
        .parse::<ProjectType>()
        .map_err(ApiError::BadRequest)?;

    let contact_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM contacts WHERE id = $1")
        .bind(request.contact_id)
        .fetch_optional(&state.pool)
        .await?;
    if contact_exists.is_none() {
        return Err(ApiError::NotFound("Contact".to_string()));
    }

    let project: ProjectRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO projects
            (contact_id, user_id, title, description, type,
             budget_cents, timeline_days, technologies, features)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(request.contact_id)
    .bind(auth.user_id)
    .bind(request.title.trim())
    .bind(&request.description)
    .bind(project_type.as_str())
    .bind(request.budget_cents)
    .bind(request.timeline_days.unwrap_or(14))
    .bind(&request.technologies)
    .bind(&request.features)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        if e.as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
        {
            ApiError::BadRequest("Ce contact a deja un projet".to_string())
        } else {
            ApiError::Database(e)
        }
    })?;

    seed_default_tasks(&state, project.id, project_type).await?;

    tracing::info!(project_id = %project.id, contact_id = %request.contact_id, "Project created");

    Ok((StatusCode::CREATED, Json(project)))
}

/// Default task list for a new project. E-commerce builds get a larger
/// development estimate.
async fn seed_default_tasks(
    state: &AppState,
    project_id: Uuid,
    project_type: ProjectType,
) -> ApiResult<()> {
    let development_hours = if project_type == ProjectType::Ecommerce {
        24
    } else {
        16
    };

    let defaults: [(&str, &str, TaskPriority, i32); 5] = [
        (
            "Analyse des besoins",
            "Definir les specifications fonctionnelles et techniques",
            TaskPriority::High,
            4,
        ),
        (
            "Design et maquettes",
            "Creer les maquettes et definir l'identite visuelle",
            TaskPriority::High,
            8,
        ),
        (
            "Developpement",
            "Developpement des fonctionnalites",
            TaskPriority::High,
            development_hours,
        ),
        (
            "Tests et optimisations",
            "Tests fonctionnels et optimisation des performances",
            TaskPriority::Medium,
            4,
        ),
        (
            "Deploiement",
            "Mise en production et configuration",
            TaskPriority::Medium,
            2,
        ),
    ];

    for (position, (title, description, priority, hours)) in defaults.into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO project_tasks
                (project_id, title, description, priority, estimated_hours, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(project_id)
        .bind(title)
        .bind(description)
        .bind(priority.as_str())
        .bind(hours)
        .bind(position as i32)
        .execute(&state.pool)
        .await?;
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub progress: Option<i32>,
    pub technologies: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub repository_url: Option<String>,
    pub staging_url: Option<String>,
    pub production_url: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub delivery_date: Option<OffsetDateTime>,
}

/// PUT /api/projects/{id} - partial update
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectRow>> {
    auth.ensure_can_edit()?;

    let status = match &request.status {
        Some(raw) => Some(
            raw.parse::<ProjectStatus>()
                .map_err(ApiError::BadRequest)?
                .as_str()
                .to_string(),
        ),
        None => None,
    };
    if let Some(progress) = request.progress {
        if !(0..=100).contains(&progress) {
            return Err(ApiError::BadRequest(
                "La progression doit etre entre 0 et 100".to_string(),
            ));
        }
    }

    let project: Option<ProjectRow> = sqlx::query_as(&format!(
        r#"
        UPDATE projects SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            progress = COALESCE($5, progress),
            technologies = COALESCE($6, technologies),
            features = COALESCE($7, features),
            is_public = COALESCE($8, is_public),
            repository_url = COALESCE($9, repository_url),
            staging_url = COALESCE($10, staging_url),
            production_url = COALESCE($11, production_url),
            end_date = COALESCE($12, end_date),
            delivery_date = COALESCE($13, delivery_date),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&request.title)
    .bind(&request.description)
    .bind(&status)
    .bind(request.progress)
    .bind(&request.technologies)
    .bind(&request.features)
    .bind(request.is_public)
    .bind(&request.repository_url)
    .bind(&request.staging_url)
    .bind(&request.production_url)
    .bind(request.end_date)
    .bind(request.delivery_date)
    .fetch_optional(&state.pool)
    .await?;

    project
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Projet".to_string()))
}

/// DELETE /api/projects/{id} - ADMIN only
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.ensure_admin()?;

    let rows = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?
        .rows_affected();

    if rows == 0 {
        return Err(ApiError::NotFound("Projet".to_string()));
    }

    tracing::info!(project_id = %id, deleted_by = %auth.user_id, "Project deleted");

    Ok(Json(json!({ "success": true })))
}
