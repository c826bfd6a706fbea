//! Authentication: argon2 passwords, JWT tokens, revocable sessions.

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod sessions;

pub use jwt::{Claims, JwtManager};
pub use middleware::{require_auth, AuthState, AuthUser};
pub use password::{hash_password, verify_password};
