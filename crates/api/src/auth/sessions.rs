//! User session management for JWT revocation
//!
//! Sessions are tracked in the `user_sessions` table with the token's
//! JTI, so individual tokens can be revoked before expiry.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

/// Maximum concurrent sessions per user; the oldest is revoked when the
/// limit is reached.
const MAX_SESSIONS_PER_USER: i64 = 10;

/// Save a new session immediately after issuing a token.
pub async fn save_session(
    pool: &PgPool,
    user_id: Uuid,
    jti: &str,
    expires_at: OffsetDateTime,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> ApiResult<()> {
    let mut tx = pool.begin().await?;

    let session_count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM user_sessions
        WHERE user_id = $1
          AND revoked_at IS NULL
          AND expires_at > NOW()
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    if session_count.0 >= MAX_SESSIONS_PER_USER {
        tracing::info!(
            user_id = %user_id,
            current_sessions = session_count.0,
            max_sessions = MAX_SESSIONS_PER_USER,
            "Revoking oldest session due to max sessions limit"
        );

        sqlx::query(
            r#"
            UPDATE user_sessions
            SET revoked_at = NOW(),
                revocation_reason = 'max_sessions_exceeded'
            WHERE id IN (
                SELECT id FROM user_sessions
                WHERE user_id = $1
                  AND revoked_at IS NULL
                ORDER BY created_at ASC
                LIMIT 1
            )
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO user_sessions (user_id, jti, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(expires_at)
    .bind(ip_address)
    .bind(user_agent)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Check whether a session (by JTI) is live: not revoked, not expired,
/// and owned by the expected user.
pub async fn is_session_valid(pool: &PgPool, jti: &str, expected_user_id: Uuid) -> ApiResult<bool> {
    let result: Option<(bool,)> = sqlx::query_as(
        r#"
        SELECT TRUE
        FROM user_sessions
        WHERE jti = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > NOW()
        "#,
    )
    .bind(jti)
    .bind(expected_user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// Revoke one session by JTI. Returns whether a live session was found.
pub async fn revoke_session(pool: &PgPool, jti: &str, reason: &str) -> ApiResult<bool> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE user_sessions
        SET revoked_at = NOW(),
            revocation_reason = $2
        WHERE jti = $1
          AND revoked_at IS NULL
        "#,
    )
    .bind(jti)
    .bind(reason)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(rows_affected > 0)
}

