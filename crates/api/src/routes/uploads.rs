//! File uploads
//!
//! Multipart uploads with a size cap and MIME allowlist, stored under
//! the uploads directory with uuid names. Deletion is path-checked
//! against traversal.

use axum::extract::{Extension, Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

const ALLOWED_TYPES: &[&str] = &[
    // images
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    // documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    // archives
    "application/zip",
    "application/x-rar-compressed",
];

fn is_allowed_type(content_type: &str) -> bool {
    ALLOWED_TYPES.contains(&content_type)
}

/// Keep categories to a single safe path segment.
fn sanitize_category(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "general".to_string()
    } else {
        cleaned.to_lowercase()
    }
}

/// Extension from the original name, bounded and alphanumeric only.
fn sanitize_extension(file_name: &str) -> Option<String> {
    let ext = file_name.rsplit_once('.')?.1;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_lowercase())
}

/// POST /api/upload
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name = String::new();
    let mut content_type = String::new();
    let mut category = "general".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Formulaire multipart invalide".to_string()))?
    {
        match field.name() {
            Some("file") => {
                original_name = field.file_name().unwrap_or("fichier").to_string();
                content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::BadRequest("Lecture du fichier impossible".to_string()))?;
                file_bytes = Some(bytes.to_vec());
            }
            Some("category") => {
                let raw = field.text().await.unwrap_or_default();
                category = sanitize_category(&raw);
            }
            _ => {}
        }
    }

    let Some(bytes) = file_bytes else {
        return Err(ApiError::BadRequest("Aucun fichier fourni".to_string()));
    };

    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "Fichier trop volumineux (max {}MB)",
            MAX_FILE_SIZE / 1024 / 1024
        )));
    }

    if !is_allowed_type(&content_type) {
        return Err(ApiError::BadRequest(
            "Type de fichier non autorise".to_string(),
        ));
    }

    let file_name = match sanitize_extension(&original_name) {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    };

    let category_dir = std::path::Path::new(&state.config.uploads_dir).join(&category);
    tokio::fs::create_dir_all(&category_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("upload directory creation failed: {e}")))?;

    let disk_path = category_dir.join(&file_name);
    tokio::fs::write(&disk_path, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("file write failed: {e}")))?;

    let public_path = format!("/uploads/{category}/{file_name}");

    tracing::info!(
        path = %public_path,
        size = bytes.len(),
        uploaded_by = %auth.user_id,
        "File uploaded"
    );

    Ok(Json(json!({
        "success": true,
        "file": {
            "originalName": original_name,
            "fileName": file_name,
            "filePath": public_path,
            "size": bytes.len(),
            "type": content_type,
            "category": category,
            "uploadedBy": auth.user_id,
            "uploadedAt": OffsetDateTime::now_utc().unix_timestamp(),
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListUploadsQuery {
    pub category: Option<String>,
}

/// GET /api/upload - list uploaded files for a category
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListUploadsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.ensure_can_edit()?;

    let category = sanitize_category(query.category.as_deref().unwrap_or("general"));
    let dir = std::path::Path::new(&state.config.uploads_dir).join(&category);

    let mut files = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            files.push(json!({
                "fileName": name,
                "filePath": format!("/uploads/{category}/{name}"),
                "size": size,
            }));
        }
    }

    let total = files.len();
    Ok(Json(json!({
        "files": files,
        "total": total,
        "categories": ["general", "projects", "testimonials", "documents"],
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub path: String,
}

/// DELETE /api/upload - remove a file by public path (ADMIN only)
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.ensure_admin()?;

    let Some(relative) = query.path.strip_prefix("/uploads/") else {
        return Err(ApiError::BadRequest(
            "Chemin de fichier invalide".to_string(),
        ));
    };
    if relative.contains("..") || relative.starts_with('/') {
        return Err(ApiError::BadRequest(
            "Chemin de fichier invalide".to_string(),
        ));
    }

    let disk_path = std::path::Path::new(&state.config.uploads_dir).join(relative);
    match tokio::fs::remove_file(&disk_path).await {
        Ok(()) => {
            tracing::info!(path = %query.path, deleted_by = %auth.user_id, "File deleted");
            Ok(Json(json!({ "success": true })))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound("Fichier".to_string()))
        }
        Err(e) => Err(ApiError::Internal(format!("file deletion failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_allowlist() {
        assert!(is_allowed_type("image/png"));
        assert!(is_allowed_type("application/pdf"));
        assert!(!is_allowed_type("application/x-msdownload"));
        assert!(!is_allowed_type("text/html"));
        assert!(!is_allowed_type(""));
    }

    #[test]
    fn test_category_sanitization() {
        assert_eq!(sanitize_category("projects"), "projects");
        assert_eq!(sanitize_category("../etc"), "etc");
        assert_eq!(sanitize_category("a/b/c"), "abc");
        assert_eq!(sanitize_category(""), "general");
    }

    #[test]
    fn test_extension_sanitization() {
        assert_eq!(sanitize_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(sanitize_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(sanitize_extension("noextension"), None);
        assert_eq!(sanitize_extension("weird.e/xt"), None);
    }
}
