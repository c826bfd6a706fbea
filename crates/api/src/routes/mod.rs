//! HTTP routes

pub mod auth;
pub mod checkout;
pub mod contact;
pub mod contacts;
pub mod crypto;
pub mod invoices;
pub mod projects;
pub mod seo;
pub mod tasks;
pub mod uploads;
pub mod webhooks;

use axum::http::HeaderMap;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

use crate::auth::require_auth;
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Everything behind the session gate.
    let admin_routes = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/{id}",
            get(projects::get).put(projects::update).delete(projects::remove),
        )
        .route(
            "/api/projects/{id}/tasks",
            get(tasks::list).post(tasks::create),
        )
        .route("/api/tasks/{id}", put(tasks::update).delete(tasks::remove))
        .route("/api/invoices", get(invoices::list))
        .route("/api/invoices/{id}", get(invoices::get))
        .route("/api/invoices/{id}/status", put(invoices::update_status))
        .route("/api/contacts", get(contacts::list))
        .route("/api/contacts/{id}", get(contacts::get))
        .route("/api/contacts/{id}/status", put(contacts::update_status))
        .route(
            "/api/upload",
            post(uploads::upload)
                .get(uploads::list)
                .delete(uploads::remove)
                // Uploads may exceed the default body limit; cap slightly
                // above the 10MB file limit to leave room for multipart
                // framing.
                .layer(axum::extract::DefaultBodyLimit::max(12 * 1024 * 1024)),
        )
        .route("/api/admin/invariants", get(invoices::run_invariants))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .route("/health", get(seo::health))
        .route("/sitemap.xml", get(seo::sitemap))
        .route("/robots.txt", get(seo::robots))
        .route("/api/auth/login", post(auth::login))
        .route("/api/contact", post(contact::submit))
        .route(
            "/api/stripe/checkout",
            post(checkout::create_session).get(checkout::get_session),
        )
        .route(
            "/api/crypto/coinbase",
            post(crypto::create_charge).get(crypto::get_charge),
        )
        .route("/api/stripe/webhook", post(webhooks::stripe_webhook))
        .route("/api/crypto/webhook", post(webhooks::crypto_webhook))
        .route("/api/projects/public", get(projects::list_public))
        .route("/api/projects/public/{id}", get(projects::get_public))
        .merge(admin_routes)
        .with_state(state)
}

/// Extract the client IP from proxy headers.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("X-Forwarded-For") {
        if let Ok(xff_str) = xff.to_str() {
            return xff_str.split(',').next().map(|s| s.trim().to_string());
        }
    }
    if let Some(real_ip) = headers.get("X-Real-IP") {
        if let Ok(ip) = real_ip.to_str() {
            return Some(ip.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("X-Real-IP", "10.0.0.2".parse().unwrap());

        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", "10.0.0.2".parse().unwrap());

        assert_eq!(extract_client_ip(&headers).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_extract_client_ip_none_without_headers() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }
}
