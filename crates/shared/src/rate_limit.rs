//! In-memory fixed-window rate limiting
//!
//! Keyed by caller identity (client IP for public endpoints). Windows
//! are one minute wide; state lives in process memory, which is enough
//! for a single-instance deployment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Contact-form submissions allowed per IP per minute.
const CONTACT_LIMIT_PER_MINUTE: u32 = 5;

/// Login attempts allowed per IP per minute.
const AUTH_LIMIT_PER_MINUTE: u32 = 10;

const WINDOW: Duration = Duration::from_secs(60);

/// Entries older than this are dropped during cleanup.
const STALE_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct WindowState {
    started_at: Instant,
    count: u32,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_seconds: Option<u64>,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    pub fn new_in_memory() -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check a contact-form submission from the given IP.
    pub async fn check_contact_by_ip(&self, ip: &str) -> RateLimitResult {
        self.check(&format!("contact:{ip}"), CONTACT_LIMIT_PER_MINUTE)
            .await
    }

    /// Check a login attempt from the given IP.
    pub async fn check_auth_by_ip(&self, ip: &str) -> RateLimitResult {
        self.check(&format!("auth:{ip}"), AUTH_LIMIT_PER_MINUTE).await
    }

    async fn check(&self, key: &str, limit: u32) -> RateLimitResult {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let state = windows
            .entry(key.to_string())
            .or_insert_with(|| WindowState {
                started_at: now,
                count: 0,
            });

        if now.duration_since(state.started_at) >= WINDOW {
            state.started_at = now;
            state.count = 0;
        }

        if state.count >= limit {
            let elapsed = now.duration_since(state.started_at);
            let retry_after = WINDOW.saturating_sub(elapsed).as_secs().max(1);
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after_seconds: Some(retry_after),
            };
        }

        state.count += 1;
        RateLimitResult {
            allowed: true,
            remaining: limit - state.count,
            retry_after_seconds: None,
        }
    }

    /// Drop windows that have been idle past the stale threshold.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, state| now.duration_since(state.started_at) < STALE_AFTER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_allowed() {
        let limiter = RateLimiter::new_in_memory();
        let result = limiter.check_contact_by_ip("192.168.1.1").await;
        assert!(result.allowed);
        assert_eq!(result.remaining, CONTACT_LIMIT_PER_MINUTE - 1);
    }

    #[tokio::test]
    async fn test_limit_enforced() {
        let limiter = RateLimiter::new_in_memory();
        let ip = "10.0.0.1";

        for _ in 0..CONTACT_LIMIT_PER_MINUTE {
            let result = limiter.check_contact_by_ip(ip).await;
            assert!(result.allowed);
        }

        let result = limiter.check_contact_by_ip(ip).await;
        assert!(!result.allowed, "request over the limit should be rejected");
        assert!(result.retry_after_seconds.is_some());
    }

    #[tokio::test]
    async fn test_different_ips_isolated() {
        let limiter = RateLimiter::new_in_memory();

        for _ in 0..CONTACT_LIMIT_PER_MINUTE {
            limiter.check_contact_by_ip("1.1.1.1").await;
        }

        let result = limiter.check_contact_by_ip("2.2.2.2").await;
        assert!(result.allowed, "other callers should not be affected");
    }

    #[tokio::test]
    async fn test_contact_and_auth_buckets_isolated() {
        let limiter = RateLimiter::new_in_memory();
        let ip = "3.3.3.3";

        for _ in 0..CONTACT_LIMIT_PER_MINUTE {
            limiter.check_contact_by_ip(ip).await;
        }
        assert!(!limiter.check_contact_by_ip(ip).await.allowed);

        // Same IP still has its auth budget.
        assert!(limiter.check_auth_by_ip(ip).await.allowed);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_fresh_windows() {
        let limiter = RateLimiter::new_in_memory();
        limiter.check_contact_by_ip("4.4.4.4").await;
        limiter.cleanup().await;

        // Window is fresh, so the count is preserved.
        let result = limiter.check_contact_by_ip("4.4.4.4").await;
        assert_eq!(result.remaining, CONTACT_LIMIT_PER_MINUTE - 2);
    }
}
