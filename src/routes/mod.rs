/**
 * Routes Module
 * API route handlers plus the response types and helpers they share
 */
pub mod applications;
pub mod auth;
pub mod companies;
pub mod health;
pub mod jobs;
pub mod profiles;
pub mod upload;

use axum::{http::HeaderMap, http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

/// Error response shared by all route modules
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

/// Success response (for deletes and simple acks)
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Pagination envelope returned by list endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_count + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total_count,
            total_pages,
            has_next: page * limit < total_count,
            has_prev: page > 1,
        }
    }
}

pub fn clamp_page(page: i64) -> i64 {
    page.max(1)
}

/// Page sizes are capped at 100 rows.
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, 100)
}

/// Lowercase a display name into a URL slug: ASCII alphanumerics are kept,
/// every other run of characters collapses to a single hyphen.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Find a skill by case-insensitive name or create it, returning its id.
/// Referenced from both job posting and profile saves; the LOWER(name)
/// unique index backs the dedup.
pub(crate) async fn find_or_create_skill(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<Uuid, sqlx::Error> {
    let name = name.trim();
    if let Some((id,)) =
        sqlx::query_as::<_, (Uuid,)>("SELECT id FROM skills WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await?
    {
        return Ok(id);
    }

    let (id,) = sqlx::query_as::<_, (Uuid,)>(
        r#"
        INSERT INTO skills (name, slug)
        VALUES ($1, $2)
        ON CONFLICT (LOWER(name)) DO UPDATE SET name = skills.name
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(slugify(name))
    .fetch_one(&mut **tx)
    .await?;

    Ok(id)
}

/// Extract and verify the bearer token, returning its claims.
pub fn require_auth(
    headers: &HeaderMap,
) -> Result<auth::Claims, (StatusCode, Json<ErrorResponse>)> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) => match auth::verify_access_token(t) {
            Ok(claims) => Ok(claims),
            Err(_) => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Invalid or expired token")),
            )),
        },
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Authorization required")),
        )),
    }
}

/// Verify the bearer token AND that it belongs to the user the request
/// claims to act as. Client-supplied ids are never trusted on their own.
pub fn require_acting_user(
    headers: &HeaderMap,
    user_id: Uuid,
) -> Result<auth::Claims, (StatusCode, Json<ErrorResponse>)> {
    let claims = require_auth(headers)?;
    if claims.sub != user_id.to_string() {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Forbidden")),
        ));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Senior Rust Engineer"), "senior-rust-engineer");
        assert_eq!(slugify("C++ / Systems"), "c-systems");
        assert_eq!(slugify("  Acme   Corp!  "), "acme-corp");
    }

    #[test]
    fn test_slugify_trims_edge_hyphens() {
        assert_eq!(slugify("--hello--"), "hello");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(3, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp_page(-5), 1);
        assert_eq!(clamp_page(7), 7);
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(1000), 100);
    }

    #[test]
    fn test_require_auth_missing_header() {
        let headers = HeaderMap::new();
        let err = require_auth(&headers).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }
}
