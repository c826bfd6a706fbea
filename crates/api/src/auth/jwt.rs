//! JWT token management
//!
//! Tokens carry a JTI that maps to a `user_sessions` row, so individual
//! tokens can be revoked before expiry.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub role: String,
    /// Token id, matched against the sessions table for revocation.
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
}

pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: OffsetDateTime,
}

impl JwtManager {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: &str) -> ApiResult<IssuedToken> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now + time::Duration::hours(self.expiry_hours);
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            jti: jti.clone(),
            exp: expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let manager = JwtManager::new("test-secret", 1);
        let user_id = Uuid::new_v4();

        let issued = manager.issue(user_id, "ADMIN").unwrap();
        let claims = manager.verify(&issued.token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "ADMIN");
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager = JwtManager::new("secret-a", 1);
        let other = JwtManager::new("secret-b", 1);

        let issued = manager.issue(Uuid::new_v4(), "USER").unwrap();
        assert!(other.verify(&issued.token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let manager = JwtManager::new("test-secret", 1);
        assert!(manager.verify("not.a.token").is_err());
    }

    #[test]
    fn test_each_token_has_unique_jti() {
        let manager = JwtManager::new("test-secret", 1);
        let user_id = Uuid::new_v4();

        let a = manager.issue(user_id, "ADMIN").unwrap();
        let b = manager.issue(user_id, "ADMIN").unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
