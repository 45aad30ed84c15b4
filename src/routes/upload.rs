/**
 * Upload Routes
 * Local-disk storage for profile pictures, resumes and company logos
 */
use axum::{
    extract::{Multipart, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::routes::{require_auth, ErrorResponse};

const UPLOAD_ROOT: &str = "uploads";

/// Size cap for images (profile pictures, logos)
const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Size cap for resumes
const MAX_RESUME_SIZE: usize = 10 * 1024 * 1024; // 10MB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadKind {
    ProfilePicture,
    Resume,
    CompanyLogo,
}

impl UploadKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "profile-picture" => Some(UploadKind::ProfilePicture),
            "resume" => Some(UploadKind::Resume),
            "company-logo" => Some(UploadKind::CompanyLogo),
            _ => None,
        }
    }

    fn dir(&self) -> &'static str {
        match self {
            UploadKind::ProfilePicture => "avatars",
            UploadKind::Resume => "resumes",
            UploadKind::CompanyLogo => "logos",
        }
    }

    fn max_size(&self) -> usize {
        match self {
            UploadKind::Resume => MAX_RESUME_SIZE,
            _ => MAX_IMAGE_SIZE,
        }
    }

    fn accepts(&self, mime: &str) -> bool {
        match self {
            UploadKind::Resume => mime == "application/pdf",
            _ => matches!(mime, "image/jpeg" | "image/png" | "image/webp"),
        }
    }

    fn rejection_message(&self) -> &'static str {
        match self {
            UploadKind::Resume => "Only PDF resumes are allowed",
            _ => "Only JPEG, PNG, and WebP images are allowed",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
}

/// Sniff the payload type from its leading bytes; the client-supplied
/// content type is never trusted.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // WebP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        // PDF: %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

fn is_safe_filename(filename: &str) -> bool {
    // Reject path traversal and special characters
    !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

/// POST /api/upload/{kind} - Store a single multipart file and return its
/// public URL
pub async fn upload_file(
    headers: HeaderMap,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if let Err(err) = require_auth(&headers) {
        return err.into_response();
    }

    let kind = match UploadKind::parse(&kind) {
        Some(kind) => kind,
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Unknown upload kind");
        }
    };

    let upload_path = PathBuf::from(UPLOAD_ROOT).join(kind.dir());
    if let Err(e) = tokio::fs::create_dir_all(&upload_path).await {
        tracing::error!("Failed to create upload directory: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to initialize upload directory",
        );
    }

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => {
            return error_response(StatusCode::BAD_REQUEST, "No file provided");
        }
        Err(e) => {
            tracing::error!("Multipart error: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid multipart data");
        }
    };

    let bytes = match field.bytes().await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!("Failed to read upload bytes: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read file data");
        }
    };

    if bytes.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Empty file");
    }

    if bytes.len() > kind.max_size() {
        let message = match kind {
            UploadKind::Resume => "File too large. Maximum size is 10MB.",
            _ => "File too large. Maximum size is 5MB.",
        };
        return error_response(StatusCode::BAD_REQUEST, message);
    }

    let mime_type = match sniff_mime(&bytes) {
        Some(mime) if kind.accepts(mime) => mime,
        _ => {
            return error_response(StatusCode::BAD_REQUEST, kind.rejection_message());
        }
    };

    let filename = format!("{}.{}", Uuid::new_v4(), extension_for_mime(mime_type));
    let file_path = upload_path.join(&filename);

    if let Err(e) = tokio::fs::write(&file_path, &bytes).await {
        tracing::error!("Failed to write upload file: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file");
    }

    let url = format!("/uploads/{}/{}", kind.dir(), filename);
    tracing::info!("File uploaded: {} ({} bytes)", filename, bytes.len());

    (
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            url,
            filename,
            size: bytes.len(),
            mime_type: mime_type.to_string(),
        }),
    )
        .into_response()
}

/// DELETE /api/upload/{kind}/{filename} - Remove a stored file
pub async fn delete_file(
    headers: HeaderMap,
    Path((kind, filename)): Path<(String, String)>,
) -> impl IntoResponse {
    if let Err(err) = require_auth(&headers) {
        return err.into_response();
    }

    let kind = match UploadKind::parse(&kind) {
        Some(kind) => kind,
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Unknown upload kind");
        }
    };

    // Path traversal protection
    if !is_safe_filename(&filename) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid filename");
    }

    let file_path = PathBuf::from(UPLOAD_ROOT).join(kind.dir()).join(&filename);

    if !file_path.exists() {
        return error_response(StatusCode::NOT_FOUND, "File not found");
    }

    if let Err(e) = tokio::fs::remove_file(&file_path).await {
        tracing::error!("Failed to delete file {}: {}", filename, e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete file");
    }

    tracing::info!("File deleted: {}", filename);
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_mime_known_signatures() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(&[0x89, 0x50, 0x4E, 0x47]), Some("image/png"));
        assert_eq!(
            sniff_mime(&[
                0x52, 0x49, 0x46, 0x46, 0x00, 0x00, 0x00, 0x00, 0x57, 0x45, 0x42, 0x50
            ]),
            Some("image/webp")
        );
        assert_eq!(sniff_mime(b"%PDF-1.7 rest"), Some("application/pdf"));
    }

    #[test]
    fn test_sniff_mime_rejects_unknown_and_short() {
        assert_eq!(sniff_mime(b"GIF8"), None);
        assert_eq!(sniff_mime(b"ab"), None);
        assert_eq!(sniff_mime(b"<html>"), None);
    }

    #[test]
    fn test_upload_kind_rules() {
        let picture = UploadKind::parse("profile-picture").unwrap();
        assert!(picture.accepts("image/png"));
        assert!(!picture.accepts("application/pdf"));
        assert_eq!(picture.max_size(), MAX_IMAGE_SIZE);

        let resume = UploadKind::parse("resume").unwrap();
        assert!(resume.accepts("application/pdf"));
        assert!(!resume.accepts("image/jpeg"));
        assert_eq!(resume.max_size(), MAX_RESUME_SIZE);

        assert!(UploadKind::parse("malware").is_none());
    }

    #[test]
    fn test_is_safe_filename() {
        assert!(is_safe_filename("abc-123.png"));
        assert!(!is_safe_filename("../etc/passwd"));
        assert!(!is_safe_filename("a/b.png"));
        assert!(!is_safe_filename("a\\b.png"));
    }
}
