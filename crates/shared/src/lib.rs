// Shared crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Atelier shared components
//!
//! Database pool construction, domain enums, the bounded retry helper,
//! the in-memory rate limiter, and the append-only analytics logger
//! used by both the payments crate and the API server.

pub mod analytics;
pub mod db;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use analytics::{AnalyticsEventBuilder, AnalyticsLogger};
pub use db::{create_migration_pool, create_pool, run_migrations};
pub use rate_limit::{RateLimitResult, RateLimiter};
pub use retry::retry_db;
pub use types::{
    ContactStatus, InvoiceStatus, ProjectStatus, ProjectType, Role, TaskPriority, TaskStatus,
};
