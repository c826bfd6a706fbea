//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use atelier_payments::PaymentsService;
use atelier_shared::analytics::AnalyticsLogger;
use atelier_shared::rate_limit::RateLimiter;

use crate::auth::{AuthState, JwtManager};
use crate::config::Config;
use crate::email::NotificationEmailService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt_manager: JwtManager,
    /// Payments are optional: without provider credentials the site
    /// still serves pages, contact intake, and the admin area.
    pub payments: Option<Arc<PaymentsService>>,
    pub email: NotificationEmailService,
    pub analytics: AnalyticsLogger,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);

        let payments = match PaymentsService::from_env(pool.clone(), config.admin_user_id) {
            Ok(svc) => {
                tracing::info!("Payments service initialized (Stripe + Coinbase Commerce)");
                Some(Arc::new(svc))
            }
            Err(e) => {
                tracing::warn!("Payments not configured: {}", e);
                None
            }
        };

        let email = NotificationEmailService::from_env();
        if email.is_enabled() {
            tracing::info!("Notification emails enabled");
        } else {
            tracing::warn!("Notification emails not configured (missing RESEND_API_KEY)");
        }

        let analytics = AnalyticsLogger::new(pool.clone());

        let rate_limiter = RateLimiter::new_in_memory();
        tracing::info!("Rate limiter initialized");

        // Periodic cleanup of idle rate-limit windows.
        let limiter_for_cleanup = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter_for_cleanup.cleanup().await;
            }
        });

        Self {
            pool,
            config,
            jwt_manager,
            payments,
            email,
            analytics,
            rate_limiter,
        }
    }

    /// Get auth state for middleware.
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
            pool: self.pool.clone(),
        }
    }

    /// Payments service or a 503-mapped error.
    pub fn payments_service(&self) -> Result<&Arc<PaymentsService>, crate::error::ApiError> {
        self.payments
            .as_ref()
            .ok_or(crate::error::ApiError::PaymentsUnavailable)
    }
}
