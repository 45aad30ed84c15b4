/**
 * Company Routes
 * Public company directory plus the owner-facing company profile endpoints
 */
use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::db::{self, models::Company, models::COMPANY_SIZES};
use crate::routes::{
    clamp_limit, clamp_page, require_acting_user, slugify, ErrorResponse, Pagination,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub size: String,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfileQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCompanyProfileRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub headquarters: Option<String>,
    /// Either plain strings or {name, address?, mapLink?} objects
    #[serde(default)]
    pub locations: Option<Vec<Value>>,
    #[serde(default)]
    pub benefits: Option<Vec<String>>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub facebook_url: Option<String>,
}

/// Owner identity embedded in company payloads
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyView {
    #[serde(flatten)]
    pub company: Company,
    /// Locations decoded back into objects for display
    pub location_details: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerSummary>,
    pub job_post_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub company: CompanyView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyListResponse {
    pub companies: Vec<CompanyView>,
    pub pagination: Pagination,
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyWithCount {
    #[sqlx(flatten)]
    company: Company,
    job_count: i64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Probe for a free slug, appending an incrementing numeric suffix until no
/// existing company claims it. Runs inside the caller's transaction so the
/// following INSERT observes the same snapshot.
pub(crate) async fn unique_company_slug(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<String, sqlx::Error> {
    let base = slugify(name);
    let base = if base.is_empty() {
        "company".to_string()
    } else {
        base
    };

    let mut slug = base.clone();
    let mut counter = 1;
    loop {
        let taken = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM companies WHERE slug = $1")
            .bind(&slug)
            .fetch_one(&mut **tx)
            .await?
            .0
            > 0;
        if !taken {
            return Ok(slug);
        }
        slug = format!("{}-{}", base, counter);
        counter += 1;
    }
}

/// Store objects as JSON strings and pass plain strings through unchanged.
fn encode_locations(locations: &[Value]) -> Vec<String> {
    locations
        .iter()
        .map(|loc| match loc {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Inverse of `encode_locations`: JSON-looking entries decode to objects,
/// anything else becomes {"name": <entry>}.
fn decode_locations(locations: &[String]) -> Vec<Value> {
    locations
        .iter()
        .map(|loc| {
            if loc.starts_with('{') {
                serde_json::from_str(loc).unwrap_or_else(|_| serde_json::json!({ "name": loc }))
            } else {
                serde_json::json!({ "name": loc })
            }
        })
        .collect()
}

fn normalize_size(size: Option<&str>) -> Option<String> {
    size.map(|s| s.to_uppercase())
        .filter(|s| COMPANY_SIZES.contains(&s.as_str()))
}

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

async fn is_job_poster(pool: &sqlx::PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = $1 AND role = 'JOB_POSTER'")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count.0 > 0)
}

async fn company_view(
    pool: &sqlx::PgPool,
    company: Company,
    with_owner: bool,
) -> Result<CompanyView, sqlx::Error> {
    let owner = if with_owner {
        sqlx::query_as::<_, OwnerSummary>(
            "SELECT id, first_name, last_name, email FROM users WHERE id = $1",
        )
        .bind(company.owner_id)
        .fetch_optional(pool)
        .await?
    } else {
        None
    };

    let job_count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM job_posts WHERE company_id = $1 AND is_active",
    )
    .bind(company.id)
    .fetch_one(pool)
    .await?;

    let location_details = decode_locations(&company.locations);

    Ok(CompanyView {
        company,
        location_details,
        owner,
        job_post_count: job_count.0,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/companies - Company directory with pagination and filters
pub async fn list_companies(Query(query): Query<CompanyListQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit);
    let offset = (page - 1) * limit;

    let mut qb = QueryBuilder::<sqlx::Postgres>::new(
        r#"
        SELECT c.*,
               (SELECT COUNT(*) FROM job_posts jp
                 WHERE jp.company_id = c.id AND jp.is_active) AS job_count
        FROM companies c
        WHERE 1=1
        "#,
    );
    let mut count_qb =
        QueryBuilder::<sqlx::Postgres>::new("SELECT COUNT(*) FROM companies c WHERE 1=1");

    for builder in [&mut qb, &mut count_qb] {
        if !query.search.is_empty() {
            let pattern = format!("%{}%", query.search);
            builder
                .push(" AND (c.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.industry ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if !query.industry.is_empty() {
            builder
                .push(" AND c.industry ILIKE ")
                .push_bind(format!("%{}%", query.industry));
        }
        if !query.size.is_empty() {
            builder.push(" AND c.size = ").push_bind(query.size.clone());
        }
    }

    qb.push(" ORDER BY c.is_verified DESC, c.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<CompanyWithCount> = match qb
        .build_query_as()
        .fetch_all(pool.as_ref())
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Database error listing companies: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch companies");
        }
    };

    let total_count: i64 = match count_qb
        .build_query_as::<(i64,)>()
        .fetch_one(pool.as_ref())
        .await
    {
        Ok((count,)) => count,
        Err(e) => {
            tracing::error!("Database error counting companies: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch companies");
        }
    };

    let companies = rows
        .into_iter()
        .map(|row| {
            let location_details = decode_locations(&row.company.locations);
            CompanyView {
                company: row.company,
                location_details,
                owner: None,
                job_post_count: row.job_count,
            }
        })
        .collect();

    (
        StatusCode::OK,
        Json(CompanyListResponse {
            companies,
            pagination: Pagination::new(page, limit, total_count),
        }),
    )
        .into_response()
}

/// GET /api/companies/profile?userId=... - The caller's own company
pub async fn get_company_profile(Query(query): Query<CompanyProfileQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match is_job_poster(pool.as_ref(), query.user_id).await {
        Ok(true) => {}
        Ok(false) => {
            return error_response(StatusCode::FORBIDDEN, "Unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking poster role: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch company profile",
            );
        }
    }

    let company = match sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE owner_id = $1")
        .bind(query.user_id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(company)) => company,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Company not found");
        }
        Err(e) => {
            tracing::error!("Database error fetching company: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch company profile",
            );
        }
    };

    match company_view(pool.as_ref(), company, true).await {
        Ok(view) => (
            StatusCode::OK,
            Json(CompanyProfileResponse {
                message: None,
                company: view,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error building company view: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch company profile",
            )
        }
    }
}

/// POST /api/companies/profile - Create the caller's company.
/// The owner_id unique constraint is the one-company-per-owner rule; a
/// violation comes back as 409 instead of a racy pre-check.
pub async fn create_company_profile(
    headers: HeaderMap,
    Json(payload): Json<SaveCompanyProfileRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_acting_user(&headers, payload.user_id) {
        return err.into_response();
    }

    if payload.name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "User ID and company name are required",
        );
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match is_job_poster(pool.as_ref(), payload.user_id).await {
        Ok(true) => {}
        Ok(false) => {
            return error_response(
                StatusCode::FORBIDDEN,
                "Unauthorized: User must be a job poster",
            );
        }
        Err(e) => {
            tracing::error!("Database error checking poster role: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create company profile",
            );
        }
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin company transaction: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create company profile",
            );
        }
    };

    let slug = match unique_company_slug(&mut tx, &payload.name).await {
        Ok(slug) => slug,
        Err(e) => {
            tracing::error!("Failed to probe company slug: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create company profile",
            );
        }
    };

    let locations = encode_locations(payload.locations.as_deref().unwrap_or_default());
    let benefits = payload.benefits.clone().unwrap_or_default();

    let company = match sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies (
            owner_id, name, slug, description, industry, size, founded_year,
            email, phone, website, headquarters, locations, benefits, logo,
            linkedin_url, twitter_url, facebook_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING *
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.name.trim())
    .bind(&slug)
    .bind(&payload.description)
    .bind(&payload.industry)
    .bind(normalize_size(payload.size.as_deref()))
    .bind(payload.founded_year)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.website)
    .bind(&payload.headquarters)
    .bind(&locations)
    .bind(&benefits)
    .bind(&payload.logo)
    .bind(&payload.linkedin_url)
    .bind(&payload.twitter_url)
    .bind(&payload.facebook_url)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(company) => company,
        Err(e) if db::is_unique_violation(&e) => {
            return error_response(StatusCode::CONFLICT, "User already has a company profile");
        }
        Err(e) => {
            tracing::error!("Failed to create company: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create company profile",
            );
        }
    };

    // Link the poster profile to its new company when it has none yet.
    if let Err(e) = sqlx::query(
        r#"
        UPDATE job_poster_profiles
        SET company_id = $1, updated_at = now()
        WHERE user_id = $2 AND company_id IS NULL
        "#,
    )
    .bind(company.id)
    .bind(payload.user_id)
    .execute(&mut *tx)
    .await
    {
        tracing::error!("Failed to link poster profile to company: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create company profile",
        );
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit company transaction: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create company profile",
        );
    }

    match company_view(pool.as_ref(), company, true).await {
        Ok(view) => (
            StatusCode::CREATED,
            Json(CompanyProfileResponse {
                message: Some("Company profile created successfully".to_string()),
                company: view,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error building company view: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create company profile",
            )
        }
    }
}

/// PUT /api/companies/profile - Update the caller's existing company
pub async fn update_company_profile(
    headers: HeaderMap,
    Json(payload): Json<SaveCompanyProfileRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_acting_user(&headers, payload.user_id) {
        return err.into_response();
    }

    if payload.name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "User ID and company name are required",
        );
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match is_job_poster(pool.as_ref(), payload.user_id).await {
        Ok(true) => {}
        Ok(false) => {
            return error_response(StatusCode::FORBIDDEN, "Unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking poster role: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update company profile",
            );
        }
    }

    let locations = payload.locations.as_deref().map(encode_locations);

    let company = match sqlx::query_as::<_, Company>(
        r#"
        UPDATE companies SET
            name = $2,
            description = COALESCE($3, description),
            industry = COALESCE($4, industry),
            size = COALESCE($5, size),
            founded_year = COALESCE($6, founded_year),
            email = COALESCE($7, email),
            phone = COALESCE($8, phone),
            website = COALESCE($9, website),
            headquarters = COALESCE($10, headquarters),
            locations = COALESCE($11, locations),
            benefits = COALESCE($12, benefits),
            logo = COALESCE($13, logo),
            linkedin_url = COALESCE($14, linkedin_url),
            twitter_url = COALESCE($15, twitter_url),
            facebook_url = COALESCE($16, facebook_url),
            updated_at = now()
        WHERE owner_id = $1
        RETURNING *
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(&payload.industry)
    .bind(normalize_size(payload.size.as_deref()))
    .bind(payload.founded_year)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.website)
    .bind(&payload.headquarters)
    .bind(&locations)
    .bind(&payload.benefits)
    .bind(&payload.logo)
    .bind(&payload.linkedin_url)
    .bind(&payload.twitter_url)
    .bind(&payload.facebook_url)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some(company)) => company,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Company not found");
        }
        Err(e) => {
            tracing::error!("Failed to update company: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update company profile",
            );
        }
    };

    match company_view(pool.as_ref(), company, true).await {
        Ok(view) => (
            StatusCode::OK,
            Json(CompanyProfileResponse {
                message: Some("Company profile updated successfully".to_string()),
                company: view,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error building company view: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update company profile",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{post, put};
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_encode_locations_mixes_strings_and_objects() {
        let input = vec![
            serde_json::json!("Bengaluru"),
            serde_json::json!({ "name": "Pune", "address": "MG Road" }),
        ];
        let encoded = encode_locations(&input);
        assert_eq!(encoded[0], "Bengaluru");
        assert!(encoded[1].starts_with('{'));
        assert!(encoded[1].contains("MG Road"));
    }

    #[test]
    fn test_decode_locations_round_trip() {
        let stored = vec![
            "Bengaluru".to_string(),
            r#"{"name":"Pune","address":"MG Road"}"#.to_string(),
            "{not json".to_string(),
        ];
        let decoded = decode_locations(&stored);
        assert_eq!(decoded[0], serde_json::json!({ "name": "Bengaluru" }));
        assert_eq!(decoded[1]["address"], "MG Road");
        assert_eq!(decoded[2], serde_json::json!({ "name": "{not json" }));
    }

    #[test]
    fn test_normalize_size() {
        assert_eq!(normalize_size(Some("startup")), Some("STARTUP".to_string()));
        assert_eq!(normalize_size(Some("ENTERPRISE")), Some("ENTERPRISE".to_string()));
        assert_eq!(normalize_size(Some("galactic")), None);
        assert_eq!(normalize_size(None), None);
    }

    fn save_body(user_id: Uuid, name: &str) -> serde_json::Value {
        serde_json::json!({ "userId": user_id, "name": name })
    }

    #[tokio::test]
    async fn test_create_company_requires_auth() {
        let app = Router::new().route("/api/companies/profile", post(create_company_profile));
        let req = Request::post("/api/companies/profile")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&save_body(Uuid::new_v4(), "Acme")).unwrap(),
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_company_missing_name_returns_bad_request() {
        let app = Router::new().route("/api/companies/profile", put(update_company_profile));
        let user_id = Uuid::new_v4();
        let token = crate::routes::auth::create_access_token(
            &user_id.to_string(),
            "owner@acme.dev",
            "JOB_POSTER",
        )
        .unwrap();
        let req = Request::put("/api/companies/profile")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(
                serde_json::to_vec(&save_body(user_id, "  ")).unwrap(),
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
