//! SEO plumbing: sitemap, robots, health

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sqlx::FromRow;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// Static marketing routes served by the frontend.
const STATIC_ROUTES: &[(&str, &str, &str)] = &[
    // (path, changefreq, priority)
    ("", "weekly", "1.0"),
    ("/services", "monthly", "0.8"),
    ("/portfolio", "weekly", "0.8"),
    ("/tarifs", "monthly", "0.7"),
    ("/contact", "yearly", "0.6"),
];

#[derive(Debug, FromRow)]
struct PublicProjectEntry {
    id: Uuid,
    updated_at: OffsetDateTime,
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn build_sitemap(site_url: &str, projects: &[PublicProjectEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    let site = xml_escape(site_url.trim_end_matches('/'));

    for (path, changefreq, priority) in STATIC_ROUTES {
        xml.push_str(&format!(
            "  <url>\n    <loc>{site}{path}</loc>\n    <changefreq>{changefreq}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n"
        ));
    }

    for project in projects {
        let lastmod = project
            .updated_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::new());
        xml.push_str(&format!(
            "  <url>\n    <loc>{site}/portfolio/{}</loc>\n    <lastmod>{lastmod}</lastmod>\n    <changefreq>monthly</changefreq>\n    <priority>0.6</priority>\n  </url>\n",
            project.id
        ));
    }

    xml.push_str("</urlset>\n");
    xml
}

/// GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>) -> ApiResult<Response> {
    let projects: Vec<PublicProjectEntry> = sqlx::query_as(
        r#"
        SELECT id, updated_at
        FROM projects
        WHERE status = 'DELIVERED' AND is_public = TRUE
        ORDER BY updated_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let xml = build_sitemap(&state.config.site_url, &projects);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

fn build_robots(site_url: &str) -> String {
    let site = site_url.trim_end_matches('/');
    format!(
        "User-agent: *\n\
         Allow: /\n\
         Disallow: /admin\n\
         Disallow: /api\n\
         \n\
         Sitemap: {site}/sitemap.xml\n"
    )
}

/// GET /robots.txt
pub async fn robots(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        build_robots(&state.config.site_url),
    )
        .into_response()
}

/// GET /health - liveness plus a database ping
pub async fn health(State(state): State<AppState>) -> Response {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "database": if db_ok { "up" } else { "down" },
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sitemap_contains_static_routes() {
        let xml = build_sitemap("https://atelier.dev", &[]);
        assert!(xml.contains("<loc>https://atelier.dev</loc>"));
        assert!(xml.contains("<loc>https://atelier.dev/services</loc>"));
        assert!(xml.contains("<loc>https://atelier.dev/contact</loc>"));
        assert!(xml.starts_with("<?xml"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_sitemap_lists_public_projects() {
        let projects = vec![PublicProjectEntry {
            id: Uuid::nil(),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }];
        let xml = build_sitemap("https://atelier.dev/", &projects);
        assert!(xml.contains("/portfolio/00000000-0000-0000-0000-000000000000"));
        assert!(xml.contains("<lastmod>1970-01-01T00:00:00Z</lastmod>"));
    }

    #[test]
    fn test_robots_disallows_admin_and_api() {
        let robots = build_robots("https://atelier.dev");
        assert!(robots.contains("Disallow: /admin"));
        assert!(robots.contains("Disallow: /api"));
        assert!(robots.contains("Sitemap: https://atelier.dev/sitemap.xml"));
    }
}
