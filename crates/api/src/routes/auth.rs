//! Session endpoints: login, logout, me

use axum::extract::{Extension, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::{password, sessions, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::routes::extract_client_ip;
use crate::state::AppState;

const AUTH_COOKIE: &str = "atelier_auth_token";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, FromRow)]
struct LoginUserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    role: String,
    password_hash: Option<String>,
    active: bool,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    let limit = state.rate_limiter.check_auth_by_ip(&ip).await;
    if !limit.allowed {
        return Err(ApiError::RateLimited {
            retry_after_seconds: limit.retry_after_seconds.unwrap_or(60),
        });
    }

    if request.email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email et mot de passe requis".to_string(),
        ));
    }

    let user: Option<LoginUserRow> = sqlx::query_as(
        "SELECT id, email, name, role, password_hash, active FROM users WHERE email = $1",
    )
    .bind(&request.email)
    .fetch_optional(&state.pool)
    .await?;

    // Same rejection for unknown user, missing hash, and bad password.
    let Some(user) = user else {
        return Err(ApiError::Unauthorized);
    };
    let Some(hash) = &user.password_hash else {
        return Err(ApiError::Unauthorized);
    };
    if !user.active || !password::verify_password(&request.password, hash) {
        return Err(ApiError::Unauthorized);
    }

    let issued = state.jwt_manager.issue(user.id, &user.role)?;

    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok());
    sessions::save_session(
        &state.pool,
        user.id,
        &issued.jti,
        issued.expires_at,
        Some(&ip),
        user_agent,
    )
    .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User logged in");

    let max_age = state.config.jwt_expiry_hours * 3600;
    let cookie =
        format!("{AUTH_COOKIE}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}", issued.token);

    let body = Json(json!({
        "token": issued.token,
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "role": user.role,
        },
    }));

    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Response> {
    sessions::revoke_session(&state.pool, &auth.jti, "logout").await?;

    tracing::info!(user_id = %auth.user_id, "User logged out");

    let cookie = format!("{AUTH_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true })),
    )
        .into_response())
}

/// GET /api/auth/me
pub async fn me(Extension(auth): Extension<AuthUser>) -> Json<serde_json::Value> {
    Json(json!({
        "id": auth.user_id,
        "email": auth.email,
        "role": auth.role,
    }))
}
