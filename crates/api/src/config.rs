//! Application configuration

use uuid::Uuid;

/// Configuration loaded from the environment.
///
/// Required variables fail startup; optional integrations (payments,
/// email) degrade with a warning instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Public origin of the site, used for redirects and the sitemap.
    pub site_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    /// Pinned owner for auto-created projects; falls back to the first
    /// ADMIN user when unset.
    pub admin_user_id: Option<Uuid>,
    pub allowed_origins: Vec<String>,
    pub uploads_dir: String,
    /// Recipient for contact-form notification emails.
    pub contact_notification_email: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let site_url =
            std::env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let jwt_expiry_hours = std::env::var("JWT_EXPIRY_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24 * 30);

        let admin_user_id = match std::env::var("ADMIN_USER_ID") {
            Ok(raw) => match raw.parse::<Uuid>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!("ADMIN_USER_ID is not a valid UUID, ignoring");
                    None
                }
            },
            Err(_) => None,
        };

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let uploads_dir =
            std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string());

        let contact_notification_email = std::env::var("CONTACT_NOTIFICATION_EMAIL").ok();

        Ok(Self {
            database_url,
            bind_address,
            site_url,
            jwt_secret,
            jwt_expiry_hours,
            admin_user_id,
            allowed_origins,
            uploads_dir,
            contact_notification_email,
        })
    }
}
