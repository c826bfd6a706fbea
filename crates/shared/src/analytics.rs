//! Append-only analytics event trail
//!
//! Payment lifecycle transitions and lead captures append rows here for
//! observability. The trail is never consulted for control flow and is
//! intentionally not deduplicated: a redelivered webhook appends again,
//! because this is an event history rather than a current-state
//! projection. Callers treat logging failures as best-effort.

use sqlx::PgPool;

/// Builder for a single analytics event.
#[derive(Debug, Clone)]
pub struct AnalyticsEventBuilder {
    event: String,
    page: String,
    session_id: Option<String>,
    properties: serde_json::Value,
}

impl AnalyticsEventBuilder {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            page: String::new(),
            session_id: None,
            properties: serde_json::json!({}),
        }
    }

    /// Page or endpoint the event originated from.
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = page.into();
        self
    }

    /// Correlation id: the external charge/session id for payment events.
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }
}

/// Writes analytics events to the append-only trail.
#[derive(Clone)]
pub struct AnalyticsLogger {
    pool: PgPool,
}

impl AnalyticsLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log_event(&self, builder: AnalyticsEventBuilder) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO analytics_events (event, page, session_id, properties)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&builder.event)
        .bind(&builder.page)
        .bind(&builder.session_id)
        .bind(&builder.properties)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = AnalyticsEventBuilder::new("payment_confirmed");
        assert_eq!(builder.event, "payment_confirmed");
        assert_eq!(builder.page, "");
        assert!(builder.session_id.is_none());
        assert_eq!(builder.properties, serde_json::json!({}));
    }

    #[test]
    fn test_builder_carries_charge_correlation() {
        let builder = AnalyticsEventBuilder::new("crypto_charge_created")
            .page("/api/crypto/webhook")
            .session_id("ch_123")
            .properties(serde_json::json!({ "package": "essentiel" }));

        assert_eq!(builder.session_id.as_deref(), Some("ch_123"));
        assert_eq!(builder.properties["package"], "essentiel");
    }
}
