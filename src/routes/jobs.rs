/**
 * Job Post Routes
 * CRUD for job posts, the public browse/search listing, and the poster-side
 * my-jobs dashboard endpoints
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{
    self,
    models::{Category, JobPost, Skill, EXPERIENCE_LEVELS, JOB_TYPES, WORK_MODES},
};
use crate::routes::{
    clamp_limit, clamp_page, find_or_create_skill, require_acting_user, slugify, ErrorResponse,
    Pagination, SuccessResponse,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub job_type: String,
    #[serde(default)]
    pub work_mode: String,
    #[serde(default)]
    pub experience_level: String,
    #[serde(default)]
    pub salary_min: Option<i32>,
    #[serde(default)]
    pub salary_max: Option<i32>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

/// Skill reference on a job payload. `skillId` is either an existing skill
/// id or a free-text skill name to find-or-create.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SkillRef {
    pub skill_id: String,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub responsibilities: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub work_mode: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_min: Option<i32>,
    #[serde(default)]
    pub salary_max: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub salary_period: Option<String>,
    #[serde(default)]
    pub show_salary: Option<bool>,
    #[serde(default)]
    pub application_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub application_email: Option<String>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub application_instructions: Option<String>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub poster_id: Option<Uuid>,
    #[serde(default)]
    pub categories: Vec<Uuid>,
    #[serde(default)]
    pub skills: Vec<SkillRef>,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub poster_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub responsibilities: Option<String>,
    #[serde(default)]
    pub benefits: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub work_mode: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_min: Option<i32>,
    #[serde(default)]
    pub salary_max: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub application_email: Option<String>,
    #[serde(default)]
    pub application_deadline: Option<DateTime<Utc>>,
    /// When present the whole skill set is replaced
    #[serde(default)]
    pub skills: Option<Vec<SkillRef>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJobRequest {
    #[serde(default)]
    pub poster_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyJobsQuery {
    pub poster_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleJobRequest {
    #[serde(default)]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub poster_id: Option<Uuid>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Company fields shown alongside a job
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub id: Uuid,
    pub name: String,
    pub logo: Option<String>,
    pub headquarters: Option<String>,
    pub locations: Vec<String>,
    pub size: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PosterSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSkillView {
    pub skill: Skill,
    pub is_required: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub job: JobPost,
    pub company: Option<CompanySummary>,
    pub poster: Option<PosterSummary>,
    pub skills: Vec<JobSkillView>,
    pub categories: Vec<Category>,
    pub application_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListResponse {
    pub jobs: Vec<JobView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub job: JobView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyJobsStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub total_applications: i64,
    pub featured_jobs: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyJobsResponse {
    pub jobs: Vec<JobView>,
    pub stats: MyJobsStats,
}

// ============================================================================
// Helpers
// ============================================================================

/// Job slugs append the creation epoch millis, so collisions are avoided by
/// construction rather than by lookup.
fn job_slug(title: &str, epoch_millis: i64) -> String {
    format!("{}-{}", slugify(title), epoch_millis)
}

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

/// Attach companies, posters, skills, categories and application counts to
/// a page of job posts with one query per relation.
async fn build_job_views(
    pool: &sqlx::PgPool,
    jobs: Vec<JobPost>,
) -> Result<Vec<JobView>, sqlx::Error> {
    if jobs.is_empty() {
        return Ok(vec![]);
    }

    let job_ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    let company_ids: Vec<Uuid> = jobs.iter().map(|j| j.company_id).collect();
    let poster_ids: Vec<Uuid> = jobs.iter().map(|j| j.poster_id).collect();

    let companies: HashMap<Uuid, CompanySummary> = sqlx::query_as::<_, CompanySummary>(
        r#"
        SELECT id, name, logo, headquarters, locations, size
        FROM companies WHERE id = ANY($1)
        "#,
    )
    .bind(&company_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|c| (c.id, c))
    .collect();

    let posters: HashMap<Uuid, PosterSummary> = sqlx::query_as::<_, PosterSummary>(
        "SELECT id, first_name, last_name FROM users WHERE id = ANY($1)",
    )
    .bind(&poster_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

    let mut skills: HashMap<Uuid, Vec<JobSkillView>> = HashMap::new();
    let skill_rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, Option<String>, bool)>(
        r#"
        SELECT js.job_post_id, s.id, s.name, s.slug, s.category, js.is_required
        FROM job_skills js
        JOIN skills s ON s.id = js.skill_id
        WHERE js.job_post_id = ANY($1)
        ORDER BY s.name
        "#,
    )
    .bind(&job_ids)
    .fetch_all(pool)
    .await?;
    for (job_id, id, name, slug, category, is_required) in skill_rows {
        skills.entry(job_id).or_default().push(JobSkillView {
            skill: Skill {
                id,
                name,
                slug,
                category,
            },
            is_required,
        });
    }

    let mut categories: HashMap<Uuid, Vec<Category>> = HashMap::new();
    let category_rows = sqlx::query_as::<_, (Uuid, Uuid, String, String)>(
        r#"
        SELECT jc.job_post_id, c.id, c.name, c.slug
        FROM job_categories jc
        JOIN categories c ON c.id = jc.category_id
        WHERE jc.job_post_id = ANY($1)
        ORDER BY c.name
        "#,
    )
    .bind(&job_ids)
    .fetch_all(pool)
    .await?;
    for (job_id, id, name, slug) in category_rows {
        categories
            .entry(job_id)
            .or_default()
            .push(Category { id, name, slug });
    }

    let application_counts: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
        r#"
        SELECT job_post_id, COUNT(*) FROM applications
        WHERE job_post_id = ANY($1)
        GROUP BY job_post_id
        "#,
    )
    .bind(&job_ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    Ok(jobs
        .into_iter()
        .map(|job| {
            let id = job.id;
            JobView {
                company: companies.get(&job.company_id).map(|c| CompanySummary {
                    id: c.id,
                    name: c.name.clone(),
                    logo: c.logo.clone(),
                    headquarters: c.headquarters.clone(),
                    locations: c.locations.clone(),
                    size: c.size.clone(),
                }),
                poster: posters.get(&job.poster_id).map(|p| PosterSummary {
                    id: p.id,
                    first_name: p.first_name.clone(),
                    last_name: p.last_name.clone(),
                }),
                skills: skills.remove(&id).unwrap_or_default(),
                categories: categories.remove(&id).unwrap_or_default(),
                application_count: application_counts.get(&id).copied().unwrap_or(0),
                job,
            }
        })
        .collect())
}

async fn build_job_view(pool: &sqlx::PgPool, job: JobPost) -> Result<JobView, sqlx::Error> {
    Ok(build_job_views(pool, vec![job])
        .await?
        .into_iter()
        .next()
        .expect("one job in, one view out"))
}

/// Replace the full skill set of a job from the request refs. Entries whose
/// skillId is an existing id are linked directly; anything else is treated
/// as a free-text name. Blank entries are dropped.
async fn attach_skills(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job_id: Uuid,
    skills: &[SkillRef],
) -> Result<(), sqlx::Error> {
    for skill_ref in skills {
        let reference = skill_ref.skill_id.trim();
        if reference.is_empty() {
            continue;
        }

        let skill_id = match Uuid::parse_str(reference) {
            Ok(id) => {
                let exists =
                    sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM skills WHERE id = $1")
                        .bind(id)
                        .fetch_one(&mut **tx)
                        .await?
                        .0
                        > 0;
                if exists {
                    id
                } else {
                    find_or_create_skill(tx, reference).await?
                }
            }
            Err(_) => find_or_create_skill(tx, reference).await?,
        };

        sqlx::query(
            r#"
            INSERT INTO job_skills (job_post_id, skill_id, is_required)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_post_id, skill_id) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(skill_id)
        .bind(skill_ref.is_required)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn can_post_jobs(pool: &sqlx::PgPool, poster_id: Uuid) -> Result<bool, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM users u
        JOIN job_poster_profiles p ON p.user_id = u.id
        WHERE u.id = $1 AND u.role = 'JOB_POSTER' AND p.can_post_jobs
        "#,
    )
    .bind(poster_id)
    .fetch_one(pool)
    .await?;
    Ok(count.0 > 0)
}

/// Fetch a job only when the given poster owns it. Not-found and not-owner
/// are deliberately indistinguishable.
async fn owned_job(
    pool: &sqlx::PgPool,
    job_id: Uuid,
    poster_id: Uuid,
) -> Result<Option<JobPost>, sqlx::Error> {
    sqlx::query_as::<_, JobPost>("SELECT * FROM job_posts WHERE id = $1 AND poster_id = $2")
        .bind(job_id)
        .bind(poster_id)
        .fetch_optional(pool)
        .await
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/jobs - Browse active jobs with pagination and AND-composed filters
pub async fn list_jobs(Query(query): Query<JobListQuery>) -> impl IntoResponse {
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
        SELECT j.* FROM job_posts j
        JOIN companies c ON c.id = j.company_id
        WHERE j.is_active
        "#,
    );
    let mut count_qb = QueryBuilder::<sqlx::Postgres>::new(
        r#"
        SELECT COUNT(*) FROM job_posts j
        JOIN companies c ON c.id = j.company_id
        WHERE j.is_active
        "#,
    );

    for builder in [&mut qb, &mut count_qb] {
        if !query.search.is_empty() {
            let pattern = format!("%{}%", query.search);
            builder
                .push(" AND (j.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR j.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if !query.location.is_empty() {
            builder
                .push(" AND j.location ILIKE ")
                .push_bind(format!("%{}%", query.location));
        }
        if !query.job_type.is_empty() {
            builder
                .push(" AND j.job_type = ")
                .push_bind(query.job_type.clone());
        }
        if !query.work_mode.is_empty() {
            builder
                .push(" AND j.work_mode = ")
                .push_bind(query.work_mode.clone());
        }
        if !query.experience_level.is_empty() {
            builder
                .push(" AND j.experience_level = ")
                .push_bind(query.experience_level.clone());
        }
        if let Some(salary_min) = query.salary_min {
            builder.push(" AND j.salary_min >= ").push_bind(salary_min);
        }
        if let Some(salary_max) = query.salary_max {
            builder.push(" AND j.salary_min <= ").push_bind(salary_max);
        }
    }

    qb.push(" ORDER BY j.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let jobs: Vec<JobPost> = match qb.build_query_as().fetch_all(pool.as_ref()).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!("Database error listing jobs: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch jobs");
        }
    };

    let total_count: i64 = match count_qb
        .build_query_as::<(i64,)>()
        .fetch_one(pool.as_ref())
        .await
    {
        Ok((count,)) => count,
        Err(e) => {
            tracing::error!("Database error counting jobs: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch jobs");
        }
    };

    match build_job_views(pool.as_ref(), jobs).await {
        Ok(views) => (
            StatusCode::OK,
            Json(JobListResponse {
                jobs: views,
                pagination: Pagination::new(page, limit, total_count),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error enriching jobs: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch jobs")
        }
    }
}

/// GET /api/jobs/{id} - Single job with relations
pub async fn get_job(Path(job_id): Path<Uuid>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match sqlx::query_as::<_, JobPost>("SELECT * FROM job_posts WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(job)) => match build_job_view(pool.as_ref(), job).await {
            Ok(view) => (
                StatusCode::OK,
                Json(JobResponse {
                    message: None,
                    job: view,
                }),
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Database error enriching job: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch job")
            }
        },
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Job not found"),
        Err(e) => {
            tracing::error!("Database error fetching job: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch job")
        }
    }
}

/// POST /api/jobs - Create a job post with its skill and category links in
/// one transaction
pub async fn create_job(
    headers: HeaderMap,
    Json(payload): Json<CreateJobRequest>,
) -> impl IntoResponse {
    let (title, description, requirements) = match (
        payload.title.as_deref().filter(|s| !s.trim().is_empty()),
        payload
            .description
            .as_deref()
            .filter(|s| !s.trim().is_empty()),
        payload
            .requirements
            .as_deref()
            .filter(|s| !s.trim().is_empty()),
    ) {
        (Some(t), Some(d), Some(r)) => (t, d, r),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
        }
    };

    let (job_type, work_mode, experience_level, company_id, poster_id) = match (
        payload.job_type.as_deref(),
        payload.work_mode.as_deref(),
        payload.experience_level.as_deref(),
        payload.company_id,
        payload.poster_id,
    ) {
        (Some(jt), Some(wm), Some(el), Some(cid), Some(pid)) => (jt, wm, el, cid, pid),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
        }
    };

    if !JOB_TYPES.contains(&job_type) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid job type");
    }
    if !WORK_MODES.contains(&work_mode) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid work mode");
    }
    if !EXPERIENCE_LEVELS.contains(&experience_level) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid experience level");
    }

    if let Err(err) = require_acting_user(&headers, poster_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match can_post_jobs(pool.as_ref(), poster_id).await {
        Ok(true) => {}
        Ok(false) => {
            return error_response(StatusCode::FORBIDDEN, "Unauthorized: User cannot post jobs");
        }
        Err(e) => {
            tracing::error!("Database error checking poster permission: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
        }
    }

    let company_exists = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM companies WHERE id = $1")
        .bind(company_id)
        .fetch_one(pool.as_ref())
        .await;
    match company_exists {
        Ok((count,)) if count > 0 => {}
        Ok(_) => {
            return error_response(StatusCode::NOT_FOUND, "Company not found");
        }
        Err(e) => {
            tracing::error!("Database error checking company: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
        }
    }

    let slug = job_slug(title, Utc::now().timestamp_millis());

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin job transaction: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
        }
    };

    let job = match sqlx::query_as::<_, JobPost>(
        r#"
        INSERT INTO job_posts (
            poster_id, company_id, title, slug, description, requirements,
            responsibilities, benefits, job_type, work_mode, experience_level,
            location, salary_min, salary_max, currency, salary_period,
            show_salary, application_deadline, application_email,
            application_url, application_instructions, is_featured, published_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
            COALESCE($15, 'USD'), COALESCE($16, 'YEARLY'), $17, $18, $19, $20,
            $21, $22, now()
        )
        RETURNING *
        "#,
    )
    .bind(poster_id)
    .bind(company_id)
    .bind(title.trim())
    .bind(&slug)
    .bind(description)
    .bind(requirements)
    .bind(&payload.responsibilities)
    .bind(&payload.benefits)
    .bind(job_type)
    .bind(work_mode)
    .bind(experience_level)
    .bind(&payload.location)
    .bind(payload.salary_min)
    .bind(payload.salary_max)
    .bind(&payload.currency)
    .bind(&payload.salary_period)
    .bind(payload.show_salary.unwrap_or(true))
    .bind(payload.application_deadline)
    .bind(&payload.application_email)
    .bind(&payload.application_url)
    .bind(&payload.application_instructions)
    .bind(payload.is_featured)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("Failed to create job post: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
        }
    };

    // Unknown category ids are silently dropped by the SELECT.
    if !payload.categories.is_empty() {
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO job_categories (job_post_id, category_id)
            SELECT $1, id FROM categories WHERE id = ANY($2)
            ON CONFLICT (job_post_id, category_id) DO NOTHING
            "#,
        )
        .bind(job.id)
        .bind(&payload.categories)
        .execute(&mut *tx)
        .await
        {
            tracing::error!("Failed to attach job categories: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
        }
    }

    if let Err(e) = attach_skills(&mut tx, job.id, &payload.skills).await {
        tracing::error!("Failed to attach job skills: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit job transaction: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post");
    }

    match build_job_view(pool.as_ref(), job).await {
        Ok(view) => (
            StatusCode::CREATED,
            Json(JobResponse {
                message: Some("Job post created successfully".to_string()),
                job: view,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error enriching created job: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create job post")
        }
    }
}

/// PUT /api/jobs/{id} - Update an owned job; a provided skill list replaces
/// the whole set
pub async fn update_job(
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> impl IntoResponse {
    let poster_id = match payload.poster_id {
        Some(id) => id,
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Poster ID is required");
        }
    };

    if let Err(err) = require_acting_user(&headers, poster_id) {
        return err.into_response();
    }

    if let Some(job_type) = payload.job_type.as_deref() {
        if !JOB_TYPES.contains(&job_type) {
            return error_response(StatusCode::BAD_REQUEST, "Invalid job type");
        }
    }
    if let Some(work_mode) = payload.work_mode.as_deref() {
        if !WORK_MODES.contains(&work_mode) {
            return error_response(StatusCode::BAD_REQUEST, "Invalid work mode");
        }
    }
    if let Some(level) = payload.experience_level.as_deref() {
        if !EXPERIENCE_LEVELS.contains(&level) {
            return error_response(StatusCode::BAD_REQUEST, "Invalid experience level");
        }
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match owned_job(pool.as_ref(), job_id, poster_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Job not found or unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking job ownership: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin job update transaction: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
    };

    let job = match sqlx::query_as::<_, JobPost>(
        r#"
        UPDATE job_posts SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            requirements = COALESCE($4, requirements),
            responsibilities = COALESCE($5, responsibilities),
            benefits = COALESCE($6, benefits),
            job_type = COALESCE($7, job_type),
            work_mode = COALESCE($8, work_mode),
            experience_level = COALESCE($9, experience_level),
            location = COALESCE($10, location),
            salary_min = COALESCE($11, salary_min),
            salary_max = COALESCE($12, salary_max),
            currency = COALESCE($13, currency),
            application_email = COALESCE($14, application_email),
            application_deadline = COALESCE($15, application_deadline),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(job_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.requirements)
    .bind(&payload.responsibilities)
    .bind(&payload.benefits)
    .bind(&payload.job_type)
    .bind(&payload.work_mode)
    .bind(&payload.experience_level)
    .bind(&payload.location)
    .bind(payload.salary_min)
    .bind(payload.salary_max)
    .bind(&payload.currency)
    .bind(&payload.application_email)
    .bind(payload.application_deadline)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("Failed to update job post: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
    };

    // Full-replace semantics: the provided set is the new truth.
    if let Some(skills) = &payload.skills {
        let cleared = sqlx::query("DELETE FROM job_skills WHERE job_post_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await;
        if let Err(e) = cleared {
            tracing::error!("Failed to clear job skills: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
        if let Err(e) = attach_skills(&mut tx, job_id, skills).await {
            tracing::error!("Failed to attach job skills: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit job update transaction: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
    }

    match build_job_view(pool.as_ref(), job).await {
        Ok(view) => (
            StatusCode::OK,
            Json(JobResponse {
                message: Some("Job updated successfully".to_string()),
                job: view,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error enriching updated job: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job")
        }
    }
}

/// DELETE /api/jobs/{id} - Delete an owned job and all dependent rows in
/// foreign-key order, all-or-nothing
pub async fn delete_job(
    headers: HeaderMap,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<DeleteJobRequest>,
) -> impl IntoResponse {
    let poster_id = match payload.poster_id {
        Some(id) => id,
        None => {
            return error_response(StatusCode::BAD_REQUEST, "Poster ID is required");
        }
    };

    if let Err(err) = require_acting_user(&headers, poster_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    match owned_job(pool.as_ref(), job_id, poster_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Job not found or unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking job ownership: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete job");
        }
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin job delete transaction: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete job");
        }
    };

    // Children first; the job post row goes last.
    for table in ["job_skills", "job_categories", "applications", "saved_jobs"] {
        let query = format!("DELETE FROM {} WHERE job_post_id = $1", table);
        if let Err(e) = sqlx::query(&query).bind(job_id).execute(&mut *tx).await {
            tracing::error!("Failed to delete {} rows: {}", table, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete job");
        }
    }

    if let Err(e) = sqlx::query("DELETE FROM job_posts WHERE id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await
    {
        tracing::error!("Failed to delete job post: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete job");
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit job delete transaction: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete job");
    }

    (
        StatusCode::OK,
        Json(SuccessResponse::new("Job deleted successfully")),
    )
        .into_response()
}

/// GET /api/jobs/my-jobs?posterId=... - The poster's jobs plus dashboard stats
pub async fn my_jobs(Query(query): Query<MyJobsQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let is_poster = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM users WHERE id = $1 AND role = 'JOB_POSTER'",
    )
    .bind(query.poster_id)
    .fetch_one(pool.as_ref())
    .await;
    match is_poster {
        Ok((count,)) if count > 0 => {}
        Ok(_) => {
            return error_response(StatusCode::FORBIDDEN, "Unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking poster role: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch jobs");
        }
    }

    let jobs = match sqlx::query_as::<_, JobPost>(
        "SELECT * FROM job_posts WHERE poster_id = $1 ORDER BY created_at DESC",
    )
    .bind(query.poster_id)
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!("Database error fetching poster jobs: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch jobs");
        }
    };

    let views = match build_job_views(pool.as_ref(), jobs).await {
        Ok(views) => views,
        Err(e) => {
            tracing::error!("Database error enriching poster jobs: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch jobs");
        }
    };

    let stats = MyJobsStats {
        total_jobs: views.len(),
        active_jobs: views.iter().filter(|v| v.job.is_active).count(),
        total_applications: views.iter().map(|v| v.application_count).sum(),
        featured_jobs: views.iter().filter(|v| v.job.is_featured).count(),
    };

    (StatusCode::OK, Json(MyJobsResponse { jobs: views, stats })).into_response()
}

/// PATCH /api/jobs/my-jobs - Activate or deactivate an owned job
pub async fn toggle_job(
    headers: HeaderMap,
    Json(payload): Json<ToggleJobRequest>,
) -> impl IntoResponse {
    let (job_id, poster_id) = match (payload.job_id, payload.poster_id) {
        (Some(j), Some(p)) => (j, p),
        _ => {
            return error_response(StatusCode::BAD_REQUEST, "Job ID and Poster ID are required");
        }
    };

    if let Err(err) = require_acting_user(&headers, poster_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let existing = match owned_job(pool.as_ref(), job_id, poster_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Job not found or unauthorized");
        }
        Err(e) => {
            tracing::error!("Database error checking job ownership: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
    };

    let is_active = payload.is_active.unwrap_or(existing.is_active);

    let job = match sqlx::query_as::<_, JobPost>(
        "UPDATE job_posts SET is_active = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(job_id)
    .bind(is_active)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("Failed to toggle job: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job");
        }
    };

    match build_job_view(pool.as_ref(), job).await {
        Ok(view) => (
            StatusCode::OK,
            Json(JobResponse {
                message: Some("Job updated successfully".to_string()),
                job: view,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error enriching toggled job: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update job")
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
    fn test_job_slug_appends_epoch_millis() {
        let slug = job_slug("Senior Rust Engineer", 1722945600000);
        assert_eq!(slug, "senior-rust-engineer-1722945600000");
    }

    #[test]
    fn test_job_slug_distinct_for_same_title() {
        assert_ne!(job_slug("Dev", 1), job_slug("Dev", 2));
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

    fn jobs_router() -> Router {
        Router::new()
            .route("/api/jobs", post(create_job))
            .route("/api/jobs/{id}", put(update_job).delete(delete_job))
            .route("/api/jobs/my-jobs", axum::routing::patch(toggle_job))
    }

    fn full_create_body(poster_id: Uuid) -> serde_json::Value {
        serde_json::json!({
            "title": "Backend Engineer",
            "description": "Build services",
            "requirements": "Rust",
            "jobType": "FULL_TIME",
            "workMode": "REMOTE",
            "experienceLevel": "MID",
            "companyId": Uuid::new_v4(),
            "posterId": poster_id,
        })
    }

    #[tokio::test]
    async fn test_create_job_missing_fields_returns_bad_request() {
        let status = send_json(
            jobs_router(),
            "POST",
            "/api/jobs",
            None,
            serde_json::json!({ "title": "Backend Engineer" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_job_invalid_enum_returns_bad_request() {
        let mut body = full_create_body(Uuid::new_v4());
        body["workMode"] = serde_json::json!("FROM_THE_MOON");
        let status = send_json(jobs_router(), "POST", "/api/jobs", None, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_job_requires_auth() {
        let status = send_json(
            jobs_router(),
            "POST",
            "/api/jobs",
            None,
            full_create_body(Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_job_rejects_foreign_token() {
        let token = crate::routes::auth::create_access_token(
            &Uuid::new_v4().to_string(),
            "p@q.r",
            "JOB_POSTER",
        )
        .unwrap();
        let status = send_json(
            jobs_router(),
            "POST",
            "/api/jobs",
            Some(&token),
            full_create_body(Uuid::new_v4()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_update_job_missing_poster_returns_bad_request() {
        let status = send_json(
            jobs_router(),
            "PUT",
            &format!("/api/jobs/{}", Uuid::new_v4()),
            None,
            serde_json::json!({ "title": "New title" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_job_requires_auth() {
        let status = send_json(
            jobs_router(),
            "DELETE",
            &format!("/api/jobs/{}", Uuid::new_v4()),
            None,
            serde_json::json!({ "posterId": Uuid::new_v4() }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_toggle_job_missing_ids_returns_bad_request() {
        let status = send_json(
            jobs_router(),
            "PATCH",
            "/api/jobs/my-jobs",
            None,
            serde_json::json!({ "isActive": false }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
