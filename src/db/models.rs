//! Database Models - structs representing database tables (used by sqlx/serde).
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Domain enumerations
// ============================================================================

/// Account role. Stored as TEXT; fixed at signup, no endpoint changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    JobSeeker,
    JobPoster,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::JobSeeker => "JOB_SEEKER",
            UserRole::JobPoster => "JOB_POSTER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JOB_SEEKER" => Some(UserRole::JobSeeker),
            "JOB_POSTER" => Some(UserRole::JobPoster),
            _ => None,
        }
    }
}

/// Application workflow status. Stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Shortlisted,
    Interview,
    Offered,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Reviewed => "REVIEWED",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Interview => "INTERVIEW",
            ApplicationStatus::Offered => "OFFERED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ApplicationStatus::Pending),
            "REVIEWED" => Some(ApplicationStatus::Reviewed),
            "SHORTLISTED" => Some(ApplicationStatus::Shortlisted),
            "INTERVIEW" => Some(ApplicationStatus::Interview),
            "OFFERED" => Some(ApplicationStatus::Offered),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            "WITHDRAWN" => Some(ApplicationStatus::Withdrawn),
            _ => None,
        }
    }

    /// Terminal statuses accept no further recruiter-side transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Offered | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Recruiter-side transition table. Re-applying the current status is
    /// always allowed so repeated updates stay idempotent.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        if *self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Reviewed | Shortlisted | Interview | Rejected),
            Reviewed => matches!(next, Shortlisted | Interview | Offered | Rejected),
            Shortlisted => matches!(next, Interview | Offered | Rejected),
            Interview => matches!(next, Offered | Rejected),
            Offered | Rejected | Withdrawn => false,
        }
    }
}

/// Company size buckets accepted by the company endpoints.
pub const COMPANY_SIZES: &[&str] = &["STARTUP", "SMALL", "MEDIUM", "LARGE", "ENTERPRISE"];

/// Employment types accepted on job posts and seeker preferences.
pub const JOB_TYPES: &[&str] = &[
    "FULL_TIME",
    "PART_TIME",
    "CONTRACT",
    "FREELANCE",
    "INTERNSHIP",
    "TEMPORARY",
];

pub const WORK_MODES: &[&str] = &["REMOTE", "ON_SITE", "HYBRID"];

pub const EXPERIENCE_LEVELS: &[&str] = &["ENTRY", "JUNIOR", "MID", "SENIOR", "LEAD", "EXECUTIVE"];

pub const SALARY_PERIODS: &[&str] = &["HOURLY", "DAILY", "WEEKLY", "MONTHLY", "YEARLY"];

pub const EDUCATION_LEVELS: &[&str] = &[
    "HIGH_SCHOOL",
    "ASSOCIATE",
    "BACHELOR",
    "MASTER",
    "DOCTORATE",
    "CERTIFICATE",
];

// ============================================================================
// Table models
// ============================================================================

/// User model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_picture: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job seeker profile, one-to-one with users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSeekerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_job_title: Option<String>,
    pub is_open_to_work: bool,
    pub years_of_experience: Option<i32>,
    pub expected_salary_min: Option<i32>,
    pub expected_salary_max: Option<i32>,
    pub currency: String,
    pub preferred_work_mode: Option<String>,
    pub preferred_job_types: Vec<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub resume_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub languages_spoken: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job poster profile, one-to-one with users
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosterProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_title: String,
    pub can_post_jobs: bool,
    pub company_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Company model. Each company belongs to exactly one owner.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub founded_year: Option<i32>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub headquarters: Option<String>,
    pub locations: Vec<String>,
    pub benefits: Vec<String>,
    pub logo: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub facebook_url: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job post model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPost {
    pub id: Uuid,
    pub poster_id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub job_type: String,
    pub work_mode: String,
    pub experience_level: String,
    pub location: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub currency: String,
    pub salary_period: String,
    pub show_salary: bool,
    pub application_deadline: Option<DateTime<Utc>>,
    pub application_email: Option<String>,
    pub application_url: Option<String>,
    pub application_instructions: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Skill model, deduplicated case-insensitively by name
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: Option<String>,
}

/// Category model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Application model. One row per (job_post_id, applicant_id) pair,
/// enforced by a unique constraint rather than a pre-insert check.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub applicant_id: Uuid,
    pub status: String,
    pub recruiter_notes: Option<String>,
    pub resume_url: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Education entry, child of a job seeker profile
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: Uuid,
    pub job_seeker_profile_id: Uuid,
    pub institution: String,
    pub degree: String,
    pub field_of_study: Option<String>,
    pub level: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub gpa: Option<f64>,
}

/// Experience entry, child of a job seeker profile
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: Uuid,
    pub job_seeker_profile_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: Option<String>,
}

/// Saved job bookmark
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Refresh token model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::JobSeeker, UserRole::JobPoster] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("ADMIN"), None);
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            "PENDING",
            "REVIEWED",
            "SHORTLISTED",
            "INTERVIEW",
            "OFFERED",
            "REJECTED",
            "WITHDRAWN",
        ] {
            let parsed = ApplicationStatus::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!(ApplicationStatus::parse("HIRED").is_none());
    }

    #[test]
    fn test_status_self_transition_always_allowed() {
        for s in [
            ApplicationStatus::Pending,
            ApplicationStatus::Reviewed,
            ApplicationStatus::Shortlisted,
            ApplicationStatus::Interview,
            ApplicationStatus::Offered,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
        ] {
            assert!(s.can_transition_to(s), "{:?} should allow itself", s);
        }
    }

    #[test]
    fn test_status_forward_transitions() {
        use ApplicationStatus::*;
        assert!(Pending.can_transition_to(Reviewed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Reviewed.can_transition_to(Interview));
        assert!(Reviewed.can_transition_to(Offered));
        assert!(Shortlisted.can_transition_to(Offered));
        assert!(Interview.can_transition_to(Offered));
    }

    #[test]
    fn test_status_terminal_states_locked() {
        use ApplicationStatus::*;
        for terminal in [Offered, Rejected, Withdrawn] {
            assert!(terminal.is_terminal());
            for next in [Pending, Reviewed, Shortlisted, Interview] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Pending.is_terminal());
        assert!(!Reviewed.is_terminal());
    }

    #[test]
    fn test_status_no_backward_transitions() {
        use ApplicationStatus::*;
        assert!(!Reviewed.can_transition_to(Pending));
        assert!(!Interview.can_transition_to(Reviewed));
        assert!(!Offered.can_transition_to(Pending));
    }

    #[test]
    fn test_enum_allow_lists_are_uppercase() {
        for list in [
            COMPANY_SIZES,
            JOB_TYPES,
            WORK_MODES,
            EXPERIENCE_LEVELS,
            SALARY_PERIODS,
            EDUCATION_LEVELS,
        ] {
            for value in list {
                assert_eq!(value.to_uppercase().as_str(), *value);
            }
        }
    }
}
