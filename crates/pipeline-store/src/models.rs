use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Intern,
    Employer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intern => "INTERN",
            Self::Employer => "EMPLOYER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INTERN" => Some(Self::Intern),
            "EMPLOYER" => Some(Self::Employer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
}

/// Role tag for conversation log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub status: String,
    pub earliest_start: Option<NaiveDate>,
    pub hours_per_week: Option<u8>,
    pub remote_ok: bool,
    pub onsite_ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationSnapshot {
    pub id: i64,
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub gpa: Option<f64>,
    pub description: String,
}

/// Serialized intern profile returned to clients after tool-driven updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub id: i64,
    pub headline: String,
    pub bio: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub availability: Option<AvailabilitySnapshot>,
    pub skills: Vec<String>,
    pub educations: Vec<EducationSnapshot>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternshipSnapshot {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub location: String,
    pub is_remote: bool,
    pub requirements: String,
    pub posted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serialized employer profile, listings included so the client can refresh
/// its whole view from the terminal stream payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerSnapshot {
    pub id: i64,
    pub company_name: String,
    pub mission: String,
    pub location: String,
    pub website: String,
    pub internships: Vec<InternshipSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantSnapshot {
    pub intern_email: String,
    pub status: String,
    pub submitted: DateTime<Utc>,
}
