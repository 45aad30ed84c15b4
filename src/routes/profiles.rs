/**
 * Job Seeker Profile Routes
 * Profile upsert with full-replace child collections (skills, education,
 * experience), plus the read-side projection used by the profile pages
 */
use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    self,
    models::{Education, Experience, JobSeekerProfile, Skill, User},
};
use crate::routes::{find_or_create_skill, require_acting_user, ErrorResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SkillInput {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EducationInput {
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub grade: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceInput {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInput {
    pub name: String,
    #[serde(default)]
    pub proficiency: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSeekerProfileRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub current_job_title: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<i32>,
    #[serde(default)]
    pub expected_salary_min: Option<i32>,
    #[serde(default)]
    pub expected_salary_max: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub preferred_work_mode: Option<String>,
    /// Free-text job types, normalized through the fixed mapping table
    #[serde(default)]
    pub job_type: Option<Vec<String>>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<SkillInput>>,
    #[serde(default)]
    pub education: Option<Vec<EducationInput>>,
    #[serde(default)]
    pub experience: Option<Vec<ExperienceInput>>,
    #[serde(default)]
    pub languages: Option<Vec<LanguageInput>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSeekerProfileResponse {
    pub success: bool,
    pub message: String,
    pub profile: JobSeekerProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerProfileQuery {
    pub user_id: Uuid,
}

/// Skill attached to a profile, with proficiency
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerSkillView {
    pub skill: Skill,
    pub proficiency_level: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerProfileView {
    #[serde(flatten)]
    pub profile: JobSeekerProfile,
    pub skills: Vec<SeekerSkillView>,
    pub educations: Vec<Education>,
    pub experiences: Vec<Experience>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerProfileResponse {
    pub success: bool,
    pub user: User,
    pub profile: Option<SeekerProfileView>,
}

// ============================================================================
// Mapping tables
// ============================================================================

/// Normalize a free-text job type into its enum value. Unknown strings
/// fall back to SCREAMING_SNAKE of the input so nothing is dropped.
pub fn map_job_type(job_type: &str) -> String {
    match job_type {
        "Full Time" => "FULL_TIME".to_string(),
        "Part Time" => "PART_TIME".to_string(),
        "Contract" => "CONTRACT".to_string(),
        "Freelance" => "FREELANCE".to_string(),
        "Internship" => "INTERNSHIP".to_string(),
        "Temporary" => "TEMPORARY".to_string(),
        other => other
            .trim()
            .to_uppercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_"),
    }
}

/// Bucket a free-text degree into an education level. Total: anything
/// unrecognized is a CERTIFICATE.
pub fn map_education_level(degree: &str) -> &'static str {
    let degree = degree.to_lowercase();

    if degree.contains("phd") || degree.contains("doctorate") {
        "DOCTORATE"
    } else if degree.contains("master")
        || degree.contains("mba")
        || degree.contains("ms")
        || degree.contains("ma")
    {
        "MASTER"
    } else if degree.contains("bachelor")
        || degree.contains("bs")
        || degree.contains("ba")
        || degree.contains("btech")
        || degree.contains("be")
    {
        "BACHELOR"
    } else if degree.contains("associate") {
        "ASSOCIATE"
    } else if degree.contains("high school") || degree.contains("12th") || degree.contains("10th") {
        "HIGH_SCHOOL"
    } else {
        "CERTIFICATE"
    }
}

fn format_language(lang: &LanguageInput) -> String {
    match lang.proficiency.as_deref() {
        Some(p) if !p.is_empty() => format!("{} ({})", lang.name, p),
        _ => lang.name.clone(),
    }
}

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/job-seeker-profile
/// Upsert the profile. Child collections are replaced wholesale (delete-all,
/// insert-all) inside the same transaction as the parent upsert.
pub async fn save_seeker_profile(
    headers: HeaderMap,
    Json(payload): Json<SaveSeekerProfileRequest>,
) -> impl IntoResponse {
    if let Err(err) = require_acting_user(&headers, payload.user_id) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("Failed to begin profile transaction: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
        }
    };

    // Patch only the user fields that were provided.
    let location = match (payload.city.as_deref(), payload.state.as_deref()) {
        (Some(city), Some(state)) if !city.is_empty() && !state.is_empty() => {
            Some(format!("{}, {}", city, state))
        }
        _ => None,
    };

    let user_updated = sqlx::query(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            bio = COALESCE($5, bio),
            website = COALESCE($6, website),
            profile_picture = COALESCE($7, profile_picture),
            location = COALESCE($8, location),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(payload.user_id)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.phone)
    .bind(&payload.bio)
    .bind(&payload.website)
    .bind(&payload.profile_picture)
    .bind(&location)
    .execute(&mut *tx)
    .await;

    match user_updated {
        Ok(result) if result.rows_affected() == 0 => {
            return error_response(StatusCode::NOT_FOUND, "User not found");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Failed to update user fields: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
        }
    }

    let preferred_job_types: Vec<String> = payload
        .job_type
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|t| map_job_type(t))
        .collect();

    let languages_spoken: Vec<String> = payload
        .languages
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(format_language)
        .collect();

    let profile = match sqlx::query_as::<_, JobSeekerProfile>(
        r#"
        INSERT INTO job_seeker_profiles (
            user_id, current_job_title, years_of_experience,
            expected_salary_min, expected_salary_max, currency,
            preferred_work_mode, preferred_job_types, date_of_birth,
            gender, resume_url, linkedin_url, portfolio_url, languages_spoken
        )
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'USD'), $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (user_id) DO UPDATE SET
            current_job_title = EXCLUDED.current_job_title,
            years_of_experience = EXCLUDED.years_of_experience,
            expected_salary_min = EXCLUDED.expected_salary_min,
            expected_salary_max = EXCLUDED.expected_salary_max,
            currency = EXCLUDED.currency,
            preferred_work_mode = EXCLUDED.preferred_work_mode,
            preferred_job_types = EXCLUDED.preferred_job_types,
            date_of_birth = EXCLUDED.date_of_birth,
            gender = EXCLUDED.gender,
            resume_url = EXCLUDED.resume_url,
            linkedin_url = EXCLUDED.linkedin_url,
            portfolio_url = EXCLUDED.portfolio_url,
            languages_spoken = EXCLUDED.languages_spoken,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(payload.user_id)
    .bind(&payload.current_job_title)
    .bind(payload.years_of_experience)
    .bind(payload.expected_salary_min)
    .bind(payload.expected_salary_max)
    .bind(&payload.currency)
    .bind(&payload.preferred_work_mode)
    .bind(&preferred_job_types)
    .bind(payload.date_of_birth)
    .bind(&payload.gender)
    .bind(&payload.resume_url)
    .bind(&payload.linkedin)
    .bind(&payload.website)
    .bind(&languages_spoken)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Failed to upsert job seeker profile: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
        }
    };

    // Full-replace semantics for each provided child collection.
    if let Some(skills) = &payload.skills {
        if let Err(e) = replace_skills(&mut tx, profile.id, skills).await {
            tracing::error!("Failed to replace profile skills: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
        }
    }

    if let Some(education) = &payload.education {
        if let Err(e) = replace_education(&mut tx, profile.id, education).await {
            tracing::error!("Failed to replace education entries: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
        }
    }

    if let Some(experience) = &payload.experience {
        if let Err(e) = replace_experience(&mut tx, profile.id, experience).await {
            tracing::error!("Failed to replace experience entries: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
        }
    }

    if let Err(e) = tx.commit().await {
        tracing::error!("Failed to commit profile transaction: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update profile");
    }

    (
        StatusCode::OK,
        Json(SaveSeekerProfileResponse {
            success: true,
            message: "Profile updated successfully".to_string(),
            profile,
        }),
    )
        .into_response()
}

async fn replace_skills(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    profile_id: Uuid,
    skills: &[SkillInput],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM seeker_skills WHERE job_seeker_profile_id = $1")
        .bind(profile_id)
        .execute(&mut **tx)
        .await?;

    for skill in skills {
        if skill.name.trim().is_empty() {
            continue;
        }
        let skill_id = find_or_create_skill(tx, &skill.name).await?;
        sqlx::query(
            r#"
            INSERT INTO seeker_skills (job_seeker_profile_id, skill_id, proficiency_level)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_seeker_profile_id, skill_id) DO NOTHING
            "#,
        )
        .bind(profile_id)
        .bind(skill_id)
        .bind(&skill.level)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn replace_education(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    profile_id: Uuid,
    education: &[EducationInput],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM educations WHERE job_seeker_profile_id = $1")
        .bind(profile_id)
        .execute(&mut **tx)
        .await?;

    for edu in education {
        let (institution, degree) = match (edu.institution.as_deref(), edu.degree.as_deref()) {
            (Some(i), Some(d)) if !i.is_empty() && !d.is_empty() => (i, d),
            _ => continue, // incomplete rows are dropped, matching the save form
        };

        sqlx::query(
            r#"
            INSERT INTO educations (
                job_seeker_profile_id, institution, degree, field_of_study,
                level, start_date, end_date, is_current, gpa
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(profile_id)
        .bind(institution)
        .bind(degree)
        .bind(&edu.field)
        .bind(map_education_level(degree))
        .bind(edu.start_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(edu.end_date)
        .bind(edu.current)
        .bind(edu.grade)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn replace_experience(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    profile_id: Uuid,
    experience: &[ExperienceInput],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM experiences WHERE job_seeker_profile_id = $1")
        .bind(profile_id)
        .execute(&mut **tx)
        .await?;

    for exp in experience {
        let (company, position) = match (exp.company.as_deref(), exp.position.as_deref()) {
            (Some(c), Some(p)) if !c.is_empty() && !p.is_empty() => (c, p),
            _ => continue,
        };

        sqlx::query(
            r#"
            INSERT INTO experiences (
                job_seeker_profile_id, job_title, company_name, location,
                start_date, end_date, is_current, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(profile_id)
        .bind(position)
        .bind(company)
        .bind(&exp.location)
        .bind(exp.start_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(exp.end_date)
        .bind(exp.current)
        .bind(&exp.description)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// GET /api/job-seeker-profile?userId=...
/// User plus profile plus ordered child collections
pub async fn get_seeker_profile(Query(query): Query<SeekerProfileQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
        }
    };

    let user = match sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(query.user_id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "User not found");
        }
        Err(e) => {
            tracing::error!("Database error fetching user: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch profile");
        }
    };

    let profile = match sqlx::query_as::<_, JobSeekerProfile>(
        "SELECT * FROM job_seeker_profiles WHERE user_id = $1",
    )
    .bind(query.user_id)
    .fetch_optional(pool.as_ref())
    .await
    {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Database error fetching seeker profile: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch profile");
        }
    };

    let view = match profile {
        Some(profile) => {
            let skills = sqlx::query_as::<_, (Uuid, String, String, Option<String>, Option<String>)>(
                r#"
                SELECT s.id, s.name, s.slug, s.category, ss.proficiency_level
                FROM seeker_skills ss
                JOIN skills s ON s.id = ss.skill_id
                WHERE ss.job_seeker_profile_id = $1
                ORDER BY s.name
                "#,
            )
            .bind(profile.id)
            .fetch_all(pool.as_ref())
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|(id, name, slug, category, proficiency_level)| SeekerSkillView {
                skill: Skill {
                    id,
                    name,
                    slug,
                    category,
                },
                proficiency_level,
            })
            .collect();

            let educations = sqlx::query_as::<_, Education>(
                r#"
                SELECT * FROM educations
                WHERE job_seeker_profile_id = $1
                ORDER BY start_date DESC
                "#,
            )
            .bind(profile.id)
            .fetch_all(pool.as_ref())
            .await
            .unwrap_or_default();

            let experiences = sqlx::query_as::<_, Experience>(
                r#"
                SELECT * FROM experiences
                WHERE job_seeker_profile_id = $1
                ORDER BY start_date DESC
                "#,
            )
            .bind(profile.id)
            .fetch_all(pool.as_ref())
            .await
            .unwrap_or_default();

            Some(SeekerProfileView {
                profile,
                skills,
                educations,
                experiences,
            })
        }
        None => None,
    };

    (
        StatusCode::OK,
        Json(SeekerProfileResponse {
            success: true,
            user,
            profile: view,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_map_job_type_known_values() {
        assert_eq!(map_job_type("Full Time"), "FULL_TIME");
        assert_eq!(map_job_type("Part Time"), "PART_TIME");
        assert_eq!(map_job_type("Contract"), "CONTRACT");
        assert_eq!(map_job_type("Freelance"), "FREELANCE");
        assert_eq!(map_job_type("Internship"), "INTERNSHIP");
        assert_eq!(map_job_type("Temporary"), "TEMPORARY");
    }

    #[test]
    fn test_map_job_type_fallback_is_total() {
        assert_eq!(map_job_type("Night Shift"), "NIGHT_SHIFT");
        assert_eq!(map_job_type("  gig  work "), "GIG_WORK");
        assert_eq!(map_job_type(""), "");
    }

    #[test]
    fn test_map_education_level_buckets() {
        assert_eq!(map_education_level("PhD in Physics"), "DOCTORATE");
        assert_eq!(map_education_level("Master of Science"), "MASTER");
        assert_eq!(map_education_level("MBA"), "MASTER");
        assert_eq!(map_education_level("Bachelor of Arts"), "BACHELOR");
        assert_eq!(map_education_level("BTech"), "BACHELOR");
        assert_eq!(map_education_level("Associate Degree"), "ASSOCIATE");
        assert_eq!(map_education_level("High School"), "HIGH_SCHOOL");
        assert_eq!(map_education_level("12th Standard"), "HIGH_SCHOOL");
        assert_eq!(map_education_level("Bootcamp"), "CERTIFICATE");
        assert_eq!(map_education_level(""), "CERTIFICATE");
    }

    #[test]
    fn test_format_language() {
        let lang = LanguageInput {
            name: "Hindi".to_string(),
            proficiency: Some("Native".to_string()),
        };
        assert_eq!(format_language(&lang), "Hindi (Native)");

        let lang = LanguageInput {
            name: "English".to_string(),
            proficiency: None,
        };
        assert_eq!(format_language(&lang), "English");
    }

    #[tokio::test]
    async fn test_save_profile_requires_auth() {
        let app = Router::new().route("/api/job-seeker-profile", post(save_seeker_profile));
        let body = serde_json::json!({ "userId": Uuid::new_v4() });
        let req = Request::post("/api/job-seeker-profile")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_save_profile_rejects_mismatched_principal() {
        let app = Router::new().route("/api/job-seeker-profile", post(save_seeker_profile));
        let token = crate::routes::auth::create_access_token(
            &Uuid::new_v4().to_string(),
            "a@b.c",
            "JOB_SEEKER",
        )
        .unwrap();
        let body = serde_json::json!({ "userId": Uuid::new_v4() });
        let req = Request::post("/api/job-seeker-profile")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
