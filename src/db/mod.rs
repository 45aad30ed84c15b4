pub mod models;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tokio::sync::OnceCell;

static DB_POOL: OnceCell<Arc<PgPool>> = OnceCell::const_new();

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/jobdesk".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

pub async fn init_pool(config: Option<DbConfig>) -> Result<Arc<PgPool>, sqlx::Error> {
    let config = config.unwrap_or_default();

    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        config.url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(3))
        .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(std::time::Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    let pool = Arc::new(pool);
    let _ = DB_POOL.set(pool.clone());

    Ok(pool)
}

pub fn get_pool() -> Option<Arc<PgPool>> {
    DB_POOL.get().cloned()
}

pub async fn health_check() -> Result<std::time::Duration, sqlx::Error> {
    let pool = get_pool()
        .ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool.as_ref()).await?;

    Ok(start.elapsed())
}

/// True when a sqlx error is a Postgres unique-constraint violation.
/// Duplicate email, duplicate company-per-owner and duplicate application
/// are all detected this way instead of via pre-insert existence checks,
/// so the invariant holds under concurrent requests.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// True when a sqlx error is a Postgres foreign-key violation (an insert
/// referencing a row that does not exist).
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            phone TEXT,
            bio TEXT,
            location TEXT,
            website TEXT,
            profile_picture TEXT,
            last_login_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    // Indexes go one statement per query; prepared statements reject
    // multi-statement strings.
    for index in [
        "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_seeker_profiles (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            current_job_title TEXT,
            is_open_to_work BOOLEAN NOT NULL DEFAULT true,
            years_of_experience INTEGER,
            expected_salary_min INTEGER,
            expected_salary_max INTEGER,
            currency TEXT NOT NULL DEFAULT 'USD',
            preferred_work_mode TEXT,
            preferred_job_types TEXT[] NOT NULL DEFAULT '{}',
            date_of_birth DATE,
            gender TEXT,
            resume_url TEXT,
            linkedin_url TEXT,
            portfolio_url TEXT,
            languages_spoken TEXT[] NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            owner_id UUID UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            industry TEXT,
            size TEXT,
            founded_year INTEGER,
            email TEXT,
            phone TEXT,
            website TEXT,
            headquarters TEXT,
            locations TEXT[] NOT NULL DEFAULT '{}',
            benefits TEXT[] NOT NULL DEFAULT '{}',
            logo TEXT,
            linkedin_url TEXT,
            twitter_url TEXT,
            facebook_url TEXT,
            is_verified BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_poster_profiles (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            job_title TEXT NOT NULL DEFAULT 'Hiring Manager',
            can_post_jobs BOOLEAN NOT NULL DEFAULT true,
            company_id UUID REFERENCES companies(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_posts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            poster_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL,
            requirements TEXT,
            responsibilities TEXT,
            benefits TEXT,
            job_type TEXT NOT NULL,
            work_mode TEXT NOT NULL,
            experience_level TEXT NOT NULL,
            location TEXT,
            salary_min INTEGER,
            salary_max INTEGER,
            currency TEXT NOT NULL DEFAULT 'USD',
            salary_period TEXT NOT NULL DEFAULT 'YEARLY',
            show_salary BOOLEAN NOT NULL DEFAULT true,
            application_deadline TIMESTAMPTZ,
            application_email TEXT,
            application_url TEXT,
            application_instructions TEXT,
            is_active BOOLEAN NOT NULL DEFAULT true,
            is_featured BOOLEAN NOT NULL DEFAULT false,
            published_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_job_posts_poster ON job_posts(poster_id)",
        "CREATE INDEX IF NOT EXISTS idx_job_posts_company ON job_posts(company_id)",
        "CREATE INDEX IF NOT EXISTS idx_job_posts_active_created \
         ON job_posts(is_active, created_at DESC)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skills (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            category TEXT
        )
    "#,
    )
    .execute(pool)
    .await?;

    // Skills are deduplicated case-insensitively by name.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_skills_name_lower ON skills(LOWER(name))
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_skills (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_post_id UUID NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
            skill_id UUID NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
            is_required BOOLEAN NOT NULL DEFAULT false,
            UNIQUE (job_post_id, skill_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_categories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_post_id UUID NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
            category_id UUID NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            UNIQUE (job_post_id, category_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    // The (job_post_id, applicant_id) unique constraint is load-bearing:
    // concurrent duplicate applications both reach the INSERT and exactly
    // one wins. Handlers treat the 23505 error as "already applied".
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS applications (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_post_id UUID NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
            applicant_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'PENDING',
            recruiter_notes TEXT,
            resume_url TEXT,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (job_post_id, applicant_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_applications_applicant \
         ON applications(applicant_id, applied_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_applications_job ON applications(job_post_id)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seeker_skills (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_seeker_profile_id UUID NOT NULL
                REFERENCES job_seeker_profiles(id) ON DELETE CASCADE,
            skill_id UUID NOT NULL REFERENCES skills(id) ON DELETE CASCADE,
            proficiency_level TEXT,
            UNIQUE (job_seeker_profile_id, skill_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS educations (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_seeker_profile_id UUID NOT NULL
                REFERENCES job_seeker_profiles(id) ON DELETE CASCADE,
            institution TEXT NOT NULL,
            degree TEXT NOT NULL,
            field_of_study TEXT,
            level TEXT NOT NULL DEFAULT 'CERTIFICATE',
            start_date DATE NOT NULL,
            end_date DATE,
            is_current BOOLEAN NOT NULL DEFAULT false,
            gpa DOUBLE PRECISION
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS experiences (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            job_seeker_profile_id UUID NOT NULL
                REFERENCES job_seeker_profiles(id) ON DELETE CASCADE,
            job_title TEXT NOT NULL,
            company_name TEXT NOT NULL,
            location TEXT,
            start_date DATE NOT NULL,
            end_date DATE,
            is_current BOOLEAN NOT NULL DEFAULT false,
            description TEXT
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS saved_jobs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            job_post_id UUID NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (user_id, job_post_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            revoked BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_token_hash \
         ON refresh_tokens(token_hash)",
        "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires_at \
         ON refresh_tokens(expires_at)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_default_uses_env_or_fallback() {
        let config = DbConfig::default();
        assert!(config.max_connections >= 1);
        assert!(config.connect_timeout_secs >= 1);
        assert!(config.idle_timeout_secs >= 1);
        assert!(!config.url.is_empty());
    }

    #[test]
    fn test_get_pool_none_before_init() {
        let pool = get_pool();
        assert!(pool.is_none());
    }

    #[tokio::test]
    async fn test_health_check_fails_without_pool() {
        let result = health_check().await;
        assert!(result.is_err());
    }

    #[test]
    fn test_is_unique_violation_rejects_other_errors() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::Configuration(
            "bad".into()
        )));
    }
}
