//! Contact-form intake
//!
//! Accepts form-encoded posts (no-JS fallback, answered with a 303
//! redirect) and JSON posts (answered with 201). The honeypot and the
//! rate limit run before validation; the store write is the only step
//! allowed to fail the request, the notification email and analytics
//! event are best-effort.

use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use atelier_shared::analytics::AnalyticsEventBuilder;
use atelier_shared::types::{ContactStatus, ProjectType};

use crate::error::ApiError;
use crate::routes::extract_client_ip;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timeline: String,
    // Honeypot fields: hidden inputs legitimate users never fill.
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub hp_field: String,
}

impl ContactForm {
    pub fn honeypot_tripped(&self) -> bool {
        !self.company.trim().is_empty()
            || !self.website.trim().is_empty()
            || !self.hp_field.trim().is_empty()
    }
}

/// Form-encoded or JSON submission, remembering which shape arrived so
/// the success response can match (303 redirect vs 201 JSON).
pub struct Submission {
    pub form: ContactForm,
    pub wants_redirect: bool,
}

impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(form) = Json::<ContactForm>::from_request(req, state)
                .await
                .map_err(|_| ApiError::BadRequest("corps de requete invalide".to_string()))?;
            Ok(Submission {
                form,
                wants_redirect: false,
            })
        } else {
            let Form(form) = Form::<ContactForm>::from_request(req, state)
                .await
                .map_err(|_| ApiError::BadRequest("formulaire invalide".to_string()))?;
            Ok(Submission {
                form,
                wants_redirect: true,
            })
        }
    }
}

/// Strip anything that looks like markup, trim, and bound the length.
fn sanitize(input: &str, max: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().chars().take(max).collect()
}

fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Sanitized field set plus any validation errors.
fn validate(form: &ContactForm) -> (CleanContact, serde_json::Map<String, serde_json::Value>) {
    let clean = CleanContact {
        name: sanitize(&form.name, 120),
        email: sanitize(&form.email, 200),
        phone: sanitize(&form.phone, 30),
        project: sanitize(&form.project, 80),
        budget: sanitize(&form.budget, 80),
        message: sanitize(&form.message, 4000),
        timeline: sanitize(&form.timeline, 80),
    };

    let mut errors = serde_json::Map::new();
    if clean.name.is_empty() {
        errors.insert("name".to_string(), json!("Le nom est requis."));
    }
    if clean.email.is_empty() || !is_valid_email(&clean.email) {
        errors.insert("email".to_string(), json!("Email invalide."));
    }
    if clean.project.is_empty() {
        errors.insert("project".to_string(), json!("Le type de projet est requis."));
    }
    if clean.message.is_empty() {
        errors.insert("message".to_string(), json!("Le message est requis."));
    }

    (clean, errors)
}

#[derive(Debug, Clone)]
struct CleanContact {
    name: String,
    email: String,
    phone: String,
    project: String,
    budget: String,
    message: String,
    timeline: String,
}

/// Map the free-form project field to a stored classification.
fn classify_project(project: &str) -> ProjectType {
    let lower = project.to_lowercase();
    if lower.contains("commerce") || lower.contains("boutique") {
        ProjectType::Ecommerce
    } else if lower.contains("app") {
        ProjectType::Application
    } else if lower.contains("refonte") {
        ProjectType::Refonte
    } else {
        ProjectType::SiteVitrine
    }
}

fn success_response(state: &AppState, wants_redirect: bool) -> Response {
    if wants_redirect {
        Redirect::to(&format!("{}/success", state.config.site_url)).into_response()
    } else {
        (StatusCode::CREATED, Json(json!({ "ok": true }))).into_response()
    }
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    submission: Submission,
) -> Result<Response, ApiError> {
    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    let limit = state.rate_limiter.check_contact_by_ip(&ip).await;
    if !limit.allowed {
        return Err(ApiError::RateLimited {
            retry_after_seconds: limit.retry_after_seconds.unwrap_or(60),
        });
    }

    // Silently accept but drop bot submissions.
    if submission.form.honeypot_tripped() {
        tracing::info!(ip = %ip, "Honeypot tripped, dropping submission");
        return Ok(success_response(&state, submission.wants_redirect));
    }

    let (clean, errors) = validate(&submission.form);
    if !errors.is_empty() {
        return Err(ApiError::validation(serde_json::Value::Object(errors)));
    }

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let message = if clean.budget.is_empty() && clean.timeline.is_empty() {
        clean.message.clone()
    } else {
        format!(
            "{}\n\nBudget: {}\nDelai: {}",
            clean.message, clean.budget, clean.timeline
        )
    };

    // Upsert by email: a repeat submission refreshes the lead instead of
    // erroring on the unique constraint; an already-won customer keeps
    // their status.
    sqlx::query(
        r#"
        INSERT INTO contacts
            (email, name, phone, message, project_type, status, source, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, 'website', $7, $8)
        ON CONFLICT (email) DO UPDATE SET
            name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            message = EXCLUDED.message,
            project_type = EXCLUDED.project_type,
            updated_at = NOW()
        "#,
    )
    .bind(&clean.email)
    .bind(&clean.name)
    .bind(&clean.phone)
    .bind(&message)
    .bind(classify_project(&clean.project).as_str())
    .bind(ContactStatus::New.as_str())
    .bind(&ip)
    .bind(user_agent)
    .execute(&state.pool)
    .await?;

    // Lead captured; everything below is best-effort.
    if let Some(notify_to) = &state.config.contact_notification_email {
        if let Err(e) = state
            .email
            .send_contact_notification(notify_to, &clean.name, &clean.email, &clean.project, &clean.message)
            .await
        {
            tracing::warn!(error = %e, "Failed to send contact notification email");
        }
    }

    if let Err(e) = state
        .analytics
        .log_event(
            AnalyticsEventBuilder::new("contact_form_submitted")
                .page("/api/contact")
                .properties(json!({
                    "project": clean.project,
                    "has_budget": !clean.budget.is_empty(),
                })),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to log contact analytics event");
    }

    tracing::info!(email = %clean.email, project = %clean.project, "New contact request");

    Ok(success_response(&state, submission.wants_redirect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_markup_and_bounds() {
        assert_eq!(sanitize("<b>hello</b> world", 100), "hello world");
        assert_eq!(sanitize("  spaced  ", 100), "spaced");
        assert_eq!(sanitize("abcdef", 3), "abc");
    }

    #[test]
    fn test_missing_name_yields_field_error() {
        let form = ContactForm {
            name: String::new(),
            email: "a@b.com".to_string(),
            project: "vitrine".to_string(),
            message: "hello world".to_string(),
            ..Default::default()
        };
        let (_, errors) = validate(&form);
        assert!(errors.contains_key("name"));
        assert!(!errors.contains_key("email"));
        assert!(!errors.contains_key("project"));
        assert!(!errors.contains_key("message"));
    }

    #[test]
    fn test_invalid_email_rejected() {
        for bad in ["", "plainaddress", "a@b", "a b@c.com", "a@.com"] {
            let form = ContactForm {
                name: "Alice".to_string(),
                email: bad.to_string(),
                project: "vitrine".to_string(),
                message: "hello".to_string(),
                ..Default::default()
            };
            let (_, errors) = validate(&form);
            assert!(errors.contains_key("email"), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn test_valid_submission_has_no_errors() {
        let form = ContactForm {
            name: "Alice".to_string(),
            email: "alice@studio.dev".to_string(),
            project: "vitrine".to_string(),
            message: "hello world".to_string(),
            ..Default::default()
        };
        let (clean, errors) = validate(&form);
        assert!(errors.is_empty());
        assert_eq!(clean.name, "Alice");
    }

    #[test]
    fn test_honeypot_detection() {
        let mut form = ContactForm {
            name: "Bot".to_string(),
            email: "bot@spam.io".to_string(),
            project: "vitrine".to_string(),
            message: "buy now".to_string(),
            ..Default::default()
        };
        assert!(!form.honeypot_tripped());

        form.website = "https://spam.io".to_string();
        assert!(form.honeypot_tripped());
    }

    #[test]
    fn test_project_classification() {
        assert_eq!(classify_project("vitrine"), ProjectType::SiteVitrine);
        assert_eq!(classify_project("e-commerce"), ProjectType::Ecommerce);
        assert_eq!(classify_project("boutique en ligne"), ProjectType::Ecommerce);
        assert_eq!(classify_project("application web"), ProjectType::Application);
        assert_eq!(classify_project("refonte"), ProjectType::Refonte);
        assert_eq!(classify_project("autre"), ProjectType::SiteVitrine);
    }
}
