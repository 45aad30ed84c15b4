/**
 * Application Routes
 * The apply/review/withdraw workflow plus saved-job bookmarks
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, models::ApplicationStatus};
use crate::routes::{require_acting_user, require_auth, ErrorResponse, SuccessResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[serde(default)]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub applicant_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantApplicationsQuery {
    pub applicant_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    #[serde(default)]
    pub applicant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplicationsQuery {
    pub poster_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveJobRequest {
    #[serde(default)]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJobsQuery {
    pub user_id: Uuid,
}

/// Job summary embedded in application payloads
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationJobView {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub job_type: String,
    pub work_mode: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: Uuid,
    pub job: ApplicationJobView,
    pub status: String,
    pub applied_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub success: bool,
    pub message: String,
    pub application: ApplicationView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListResponse {
    pub success: bool,
    pub applications: Vec<ApplicationView>,
}

/// Applicant identity shown to the poster
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterApplicationView {
    pub id: Uuid,
    pub applicant: ApplicantSummary,
    pub status: String,
    pub applied_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub notes: Option<String>,
    pub resume_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterApplicationListResponse {
    pub success: bool,
    pub applications: Vec<PosterApplicationView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJobView {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJobListResponse {
    pub success: bool,
    pub saved_jobs: Vec<SavedJobView>,
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

/// Application joined with its job and company, as read from the store.
/// Joined columns are aliased so FromRow can resolve them by name.
#[derive(Debug, sqlx::FromRow)]
struct ApplicationRecord {
    id: Uuid,
    status: String,
    recruiter_notes: Option<String>,
    applied_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    job_id: Uuid,
    job_title: String,
    job_location: Option<String>,
    job_type: String,
    work_mode: String,
    company_name: String,
}

fn application_view(record: ApplicationRecord) -> ApplicationView {
    ApplicationView {
        id: record.id,
        job: ApplicationJobView {
            id: record.job_id,
            title: record.job_title,
            company: record.company_name,
            location: record.job_location,
            job_type: record.job_type,
            work_mode: record.work_mode,
        },
        status: record.status,
        applied_date: record.applied_at,
        last_updated: record.updated_at,
        notes: record.recruiter_notes,
    }
}

const APPLICATION_VIEW_COLUMNS: &str = r#"
    a.id, a.status, a.recruiter_notes, a.applied_at, a.updated_at,
    j.id AS job_id, j.title AS job_title, j.location AS job_location,
    j.job_type, j.work_mode, c.name AS company_name
"#;

async fn fetch_application_view(
    pool: &sqlx::PgPool,
    application_id: Uuid,
) -> Result<Option<ApplicationView>, sqlx::Error> {
    let record = sqlx::query_as::<_, ApplicationRecord>(&format!(
        r#"
        SELECT {APPLICATION_VIEW_COLUMNS}
        FROM applications a
        JOIN job_posts j ON j.id = a.job_post_id
        JOIN companies c ON c.id = j.company_id
        WHERE a.id = $1
        "#
    ))
    .bind(application_id)
    .fetch_optional(pool)
    .await?;

    Ok(record.map(application_view))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/applications - Apply to a job.
/// No pre-insert existence check: the UNIQUE(job_post_id, applicant_id)
/// constraint decides, so two concurrent identical requests leave exactly
/// one row.
pub async fn apply(headers: HeaderMap, Json(payload): Json<ApplyRequest>) -> impl IntoResponse {
    let (job_id, applicant_id) = match (payload.job_id, payload.applicant_id) {
        (Some(j), Some(a)) => (j, a),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Job ID and Applicant ID are required",
            );
        }
    };

    if let Err(err) = require_acting_user(&headers, applicant_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let application_id = match sqlx::query_as::<_, (Uuid,)>(
        r#"
        INSERT INTO applications (job_post_id, applicant_id, status, recruiter_notes, resume_url)
        VALUES ($1, $2, 'PENDING', $3, $4)
        RETURNING id
        "#,
    )
    .bind(job_id)
    .bind(applicant_id)
    .bind(&payload.notes)
    .bind(&payload.resume_url)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok((id,)) => id,
        Err(e) if db::is_unique_violation(&e) => {
            return error_response(StatusCode::BAD_REQUEST, "You have already applied to this job");
        }
        Err(e) if db::is_foreign_key_violation(&e) => {
            return error_response(StatusCode::NOT_FOUND, "Job not found");
        }
        Err(e) => {
            tracing::error!("Failed to create application: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to submit application",
            );
        }
    };

    match fetch_application_view(pool.as_ref(), application_id).await {
        Ok(Some(view)) => (
            StatusCode::CREATED,
            Json(ApplicationResponse {
                success: true,
                message: "Application submitted successfully".to_string(),
                application: view,
            }),
        )
            .into_response(),
        Ok(None) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to submit application",
        ),
        Err(e) => {
            tracing::error!("Failed to fetch created application: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to submit application",
            )
        }
    }
}

/// GET /api/applications?applicantId=... - The applicant's applications
pub async fn list_for_applicant(
    Query(query): Query<ApplicantApplicationsQuery>,
) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match sqlx::query_as::<_, ApplicationRecord>(&format!(
        r#"
        SELECT {APPLICATION_VIEW_COLUMNS}
        FROM applications a
        JOIN job_posts j ON j.id = a.job_post_id
        JOIN companies c ON c.id = j.company_id
        WHERE a.applicant_id = $1
        ORDER BY a.applied_at DESC
        "#
    ))
    .bind(query.applicant_id)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApplicationListResponse {
                success: true,
                applications: rows.into_iter().map(application_view).collect(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error fetching applications: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch applications",
            )
        }
    }
}

/// PATCH /api/applications/{id} - Partial update of status and/or notes.
/// A provided status must be legal per the transition table. Any
/// authenticated caller may update; the caller is not bound to the job's
/// poster (see DESIGN.md).
pub async fn update_application(
    headers: HeaderMap,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<UpdateApplicationRequest>,
) -> impl IntoResponse {
    let next_status = match payload.status.as_deref() {
        Some(raw) => match ApplicationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(StatusCode::BAD_REQUEST, "Invalid application status");
            }
        },
        None => None,
    };

    if let Err(err) = require_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let current = match sqlx::query_as::<_, (String,)>(
        "SELECT status FROM applications WHERE id = $1",
    )
    .bind(application_id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(Some((status,))) => status,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Application not found");
        }
        Err(e) => {
            tracing::error!("Database error fetching application: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update application",
            );
        }
    };

    if let Some(next) = next_status {
        let current_status = ApplicationStatus::parse(&current);
        let legal = current_status
            .map(|c| c.can_transition_to(next))
            .unwrap_or(false);
        if !legal {
            return error_response(
                StatusCode::CONFLICT,
                "Illegal application status transition",
            );
        }
    }

    // Only provided fields are written; updated_at always moves.
    let updated = sqlx::query_as::<_, (Uuid,)>(
        r#"
        UPDATE applications SET
            status = COALESCE($2, status),
            recruiter_notes = COALESCE($3, recruiter_notes),
            updated_at = now()
        WHERE id = $1
        RETURNING id
        "#,
    )
    .bind(application_id)
    .bind(next_status.map(|s| s.as_str()))
    .bind(&payload.notes)
    .fetch_one(pool.as_ref())
    .await;

    if let Err(e) = updated {
        tracing::error!("Failed to update application: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update application",
        );
    }

    match fetch_application_view(pool.as_ref(), application_id).await {
        Ok(Some(view)) => (
            StatusCode::OK,
            Json(ApplicationResponse {
                success: true,
                message: "Application updated successfully".to_string(),
                application: view,
            }),
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Application not found"),
        Err(e) => {
            tracing::error!("Failed to fetch updated application: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update application",
            )
        }
    }
}

/// POST /api/applications/{id}/withdraw - Applicant-side withdrawal, allowed
/// from any prior status
pub async fn withdraw_application(
    headers: HeaderMap,
    Path(application_id): Path<Uuid>,
    Json(payload): Json<WithdrawRequest>,
) -> impl IntoResponse {
    let applicant_id = match payload.applicant_id {
        Some(id) => id,
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Applicant ID is required");
        }
    };

    if let Err(err) = require_acting_user(&headers, applicant_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let updated = match sqlx::query(
        r#"
        UPDATE applications SET status = 'WITHDRAWN', updated_at = now()
        WHERE id = $1 AND applicant_id = $2
        "#,
    )
    .bind(application_id)
    .bind(applicant_id)
    .execute(pool.as_ref())
    .await
    {
        Ok(result) => result.rows_affected(),
        Err(e) => {
            tracing::error!("Failed to withdraw application: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to withdraw application",
            );
        }
    };

    if updated == 0 {
        return error_response(StatusCode::NOT_FOUND, "Application not found");
    }

    match fetch_application_view(pool.as_ref(), application_id).await {
        Ok(Some(view)) => (
            StatusCode::OK,
            Json(ApplicationResponse {
                success: true,
                message: "Application withdrawn successfully".to_string(),
                application: view,
            }),
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Application not found"),
        Err(e) => {
            tracing::error!("Failed to fetch withdrawn application: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to withdraw application",
            )
        }
    }
}

/// DELETE /api/applications/{id} - Hard delete, independent of status
pub async fn delete_application(
    headers: HeaderMap,
    Path(application_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(err) = require_auth(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match sqlx::query("DELETE FROM applications WHERE id = $1")
        .bind(application_id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            error_response(StatusCode::NOT_FOUND, "Application not found")
        }
        Ok(_) => (
            StatusCode::OK,
            Json(SuccessResponse::new("Application deleted successfully")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to delete application: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete application",
            )
        }
    }
}

/// GET /api/applications/job/{jobId}?posterId=... - Poster-side listing for
/// one job; ownership is required and not-found is indistinguishable from
/// not-owner
pub async fn list_for_job(
    Path(job_id): Path<Uuid>,
    Query(query): Query<JobApplicationsQuery>,
) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let owns_job = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM job_posts WHERE id = $1 AND poster_id = $2",
    )
    .bind(job_id)
    .bind(query.poster_id)
    .fetch_one(pool.as_ref())
    .await;
    match owns_job {
        Ok((count,)) if count > 0 => {}
        Ok(_) => {
            return error_response(StatusCode::NOT_FOUND, "Job not found or unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking job ownership: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch applications",
            );
        }
    }

    #[derive(sqlx::FromRow)]
    struct PosterRecord {
        id: Uuid,
        status: String,
        recruiter_notes: Option<String>,
        resume_url: Option<String>,
        applied_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        applicant_id: Uuid,
        first_name: String,
        last_name: String,
        email: String,
        profile_picture: Option<String>,
    }

    match sqlx::query_as::<_, PosterRecord>(
        r#"
        SELECT a.id, a.status, a.recruiter_notes, a.resume_url, a.applied_at, a.updated_at,
               u.id AS applicant_id, u.first_name, u.last_name, u.email, u.profile_picture
        FROM applications a
        JOIN users u ON u.id = a.applicant_id
        WHERE a.job_post_id = $1
        ORDER BY a.applied_at DESC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(rows) => {
            let applications = rows
                .into_iter()
                .map(|r| PosterApplicationView {
                    id: r.id,
                    applicant: ApplicantSummary {
                        id: r.applicant_id,
                        first_name: r.first_name,
                        last_name: r.last_name,
                        email: r.email,
                        profile_picture: r.profile_picture,
                    },
                    status: r.status,
                    applied_date: r.applied_at,
                    last_updated: r.updated_at,
                    notes: r.recruiter_notes,
                    resume_url: r.resume_url,
                })
                .collect();
            (
                StatusCode::OK,
                Json(PosterApplicationListResponse {
                    success: true,
                    applications,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error fetching job applications: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch applications",
            )
        }
    }
}

/// POST /api/saved-jobs - Bookmark a job; duplicates resolve via the unique
/// constraint
pub async fn save_job(headers: HeaderMap, Json(payload): Json<SaveJobRequest>) -> impl IntoResponse {
    let (job_id, user_id) = match (payload.job_id, payload.user_id) {
        (Some(j), Some(u)) => (j, u),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Job ID and User ID are required");
        }
    };

    if let Err(err) = require_acting_user(&headers, user_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match sqlx::query("INSERT INTO saved_jobs (user_id, job_post_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(job_id)
        .execute(pool.as_ref())
        .await
    {
        Ok(_) => (
            StatusCode::CREATED,
            Json(SuccessResponse::new("Job saved successfully")),
        )
            .into_response(),
        Err(e) if db::is_unique_violation(&e) => {
            error_response(StatusCode::CONFLICT, "Job already saved")
        }
        Err(e) if db::is_foreign_key_violation(&e) => {
            error_response(StatusCode::NOT_FOUND, "Job not found")
        }
        Err(e) => {
            tracing::error!("Failed to save job: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save job")
        }
    }
}

/// DELETE /api/saved-jobs/{id} - Remove a bookmark
pub async fn unsave_job(headers: HeaderMap, Path(saved_job_id): Path<Uuid>) -> impl IntoResponse {
    let claims = match require_auth(&headers) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return error_response(StatusCode::UNAUTHORIZED, "Invalid or expired token");
        }
    };

    match sqlx::query("DELETE FROM saved_jobs WHERE id = $1 AND user_id = $2")
        .bind(saved_job_id)
        .bind(user_id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            error_response(StatusCode::NOT_FOUND, "Saved job not found")
        }
        Ok(_) => (
            StatusCode::OK,
            Json(SuccessResponse::new("Saved job removed successfully")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to remove saved job: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to remove saved job",
            )
        }
    }
}

/// GET /api/saved-jobs?userId=... - The user's bookmarks with job summaries
pub async fn list_saved_jobs(Query(query): Query<SavedJobsQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>, String, DateTime<Utc>)>(
        r#"
        SELECT sj.id, j.id, j.title, j.location, c.name, sj.created_at
        FROM saved_jobs sj
        JOIN job_posts j ON j.id = sj.job_post_id
        JOIN companies c ON c.id = j.company_id
        WHERE sj.user_id = $1
        ORDER BY sj.created_at DESC
        "#,
    )
    .bind(query.user_id)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(rows) => {
            let saved_jobs = rows
                .into_iter()
                .map(
                    |(id, job_post_id, title, location, company, saved_at)| SavedJobView {
                        id,
                        job_post_id,
                        title,
                        company,
                        location,
                        saved_at,
                    },
                )
                .collect();
            (
                StatusCode::OK,
                Json(SavedJobListResponse {
                    success: true,
                    saved_jobs,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error fetching saved jobs: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch saved jobs",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{patch, post};
    use axum::Router;
    use tower::ServiceExt;

    fn apps_router() -> Router {
        Router::new()
            .route("/api/applications", post(apply))
            .route(
                "/api/applications/{id}",
                patch(update_application).delete(delete_application),
            )
            .route(
                "/api/applications/{id}/withdraw",
                post(withdraw_application),
            )
            .route("/api/saved-jobs", post(save_job))
    }

    async fn send_json(
        app: Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        json: serde_json::Value,
    ) -> StatusCode {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = builder
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_apply_missing_ids_returns_bad_request() {
        let status = send_json(
            apps_router(),
            "POST",
            "/api/applications",
            None,
            serde_json::json!({ "jobId": Uuid::new_v4() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_apply_requires_auth() {
        let status = send_json(
            apps_router(),
            "POST",
            "/api/applications",
            None,
            serde_json::json!({ "jobId": Uuid::new_v4(), "applicantId": Uuid::new_v4() }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_apply_rejects_foreign_token() {
        let token = crate::routes::auth::create_access_token(
            &Uuid::new_v4().to_string(),
            "x@y.z",
            "JOB_SEEKER",
        )
        .unwrap();
        let status = send_json(
            apps_router(),
            "POST",
            "/api/applications",
            Some(&token),
            serde_json::json!({ "jobId": Uuid::new_v4(), "applicantId": Uuid::new_v4() }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_application_rejects_unknown_status() {
        let status = send_json(
            apps_router(),
            "PATCH",
            &format!("/api/applications/{}", Uuid::new_v4()),
            None,
            serde_json::json!({ "status": "TELEPORTED" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_application_requires_auth() {
        let status = send_json(
            apps_router(),
            "PATCH",
            &format!("/api/applications/{}", Uuid::new_v4()),
            None,
            serde_json::json!({ "status": "REVIEWED" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_withdraw_missing_applicant_returns_bad_request() {
        let status = send_json(
            apps_router(),
            "POST",
            &format!("/api/applications/{}/withdraw", Uuid::new_v4()),
            None,
            serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_application_requires_auth() {
        let status = send_json(
            apps_router(),
            "DELETE",
            &format!("/api/applications/{}", Uuid::new_v4()),
            None,
            serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_save_job_missing_ids_returns_bad_request() {
        let status = send_json(
            apps_router(),
            "POST",
            "/api/saved-jobs",
            None,
            serde_json::json!({ "jobId": Uuid::new_v4() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
