//! Notification email delivery via Resend
//!
//! Every send here is best-effort: callers log failures and move on,
//! because the primary transaction (lead captured, payment recorded) has
//! already succeeded by the time an email goes out.

use serde_json::json;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct NotificationEmailService {
    http: reqwest::Client,
    api_key: Option<String>,
    from_address: String,
}

impl NotificationEmailService {
    pub fn from_env() -> Self {
        let api_key = std::env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty());
        let from_address = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Atelier <no-reply@atelier.dev>".to_string());

        Self {
            http: reqwest::Client::new(),
            api_key,
            from_address,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Notify the studio about a new contact-form lead.
    pub async fn send_contact_notification(
        &self,
        to: &str,
        name: &str,
        email: &str,
        project: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        let subject = format!("Nouveau contact: {name}");
        let text = format!(
            "Nouvelle demande de contact\n\n\
             Nom: {name}\n\
             Email: {email}\n\
             Projet: {project}\n\n\
             Message:\n{message}\n"
        );
        self.send(to, &subject, &text).await
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> anyhow::Result<()> {
        let Some(api_key) = &self.api_key else {
            anyhow::bail!("email service not configured (missing RESEND_API_KEY)");
        };

        let response = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from_address,
                "to": [to],
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("email delivery failed with {status}: {body}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_api_key() {
        // from_env without RESEND_API_KEY set in the test environment
        let service = NotificationEmailService {
            http: reqwest::Client::new(),
            api_key: None,
            from_address: "t@example.com".to_string(),
        };
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_send_fails_fast_when_disabled() {
        let service = NotificationEmailService {
            http: reqwest::Client::new(),
            api_key: None,
            from_address: "t@example.com".to_string(),
        };
        let result = service
            .send_contact_notification("a@b.com", "Alice", "alice@b.com", "SITE_VITRINE", "hi")
            .await;
        assert!(result.is_err());
    }
}
