//! Authentication middleware for Axum

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use atelier_shared::types::Role;

use super::jwt::JwtManager;
use super::sessions;
use crate::error::ApiError;

/// Cookie set by the frontend after login.
const AUTH_COOKIE: &str = "atelier_auth_token";

/// Authenticated user attached to the request after the middleware runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub email: String,
    /// Token id, used by logout to revoke exactly this session.
    pub jti: String,
}

impl AuthUser {
    /// ADMIN or EDITOR may write.
    pub fn ensure_can_edit(&self) -> Result<(), ApiError> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Destructive operations are ADMIN only.
    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// State needed for authentication.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
    pub pool: PgPool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    email: String,
    role: String,
    active: bool,
}

fn extract_token_from_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            for cookie in cookies.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix(&format!("{AUTH_COOKIE}=")) {
                    return Some(token.to_string());
                }
            }
            None
        })
}

/// Bearer token from the Authorization header, falling back to the
/// HttpOnly cookie for browser clients.
fn extract_bearer_token(request: &Request) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    extract_token_from_cookie(request)
}

/// Middleware that requires a live, revocable session.
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(&request) else {
        return ApiError::Unauthorized.into_response();
    };

    let claims = match auth_state.jwt_manager.verify(&token) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    // Token checks out cryptographically; the session row decides
    // whether it is still live.
    match sessions::is_session_valid(&auth_state.pool, &claims.jti, claims.sub).await {
        Ok(true) => {}
        Ok(false) => return ApiError::Unauthorized.into_response(),
        Err(e) => return e.into_response(),
    }

    let user: Option<UserRow> =
        match sqlx::query_as("SELECT email, role, active FROM users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&auth_state.pool)
            .await
        {
            Ok(user) => user,
            Err(e) => return ApiError::Database(e).into_response(),
        };

    let Some(user) = user else {
        return ApiError::Unauthorized.into_response();
    };
    if !user.active {
        return ApiError::Forbidden.into_response();
    }

    let role = match user.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(user_id = %claims.sub, error = %e, "User row carries an unknown role");
            return ApiError::Internal("invalid role".to_string()).into_response();
        }
    };

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        role,
        email: user.email,
        jti: claims.jti,
    });

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_can_edit_but_not_delete() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Editor,
            email: "e@studio.dev".to_string(),
            jti: "jti".to_string(),
        };
        assert!(user.ensure_can_edit().is_ok());
        assert!(user.ensure_admin().is_err());
    }

    #[test]
    fn test_plain_user_cannot_edit() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::User,
            email: "u@studio.dev".to_string(),
            jti: "jti".to_string(),
        };
        assert!(user.ensure_can_edit().is_err());
    }
}
