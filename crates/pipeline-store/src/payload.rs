//! Declarative patch payloads sent by agent tools.
//!
//! Each payload is a partial update: every field is optional and only present
//! fields are written. Validation happens once, at the boundary, before any
//! database work.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid payload json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Immediately,
    FromDate,
    Unavailable,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediately => "IMMEDIATELY",
            Self::FromDate => "FROM_DATE",
            Self::Unavailable => "UNAVAILABLE",
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityPatch {
    pub status: AvailabilityStatus,
    #[serde(default)]
    pub earliest_start: Option<NaiveDate>,
    #[serde(default)]
    pub hours_per_week: Option<u8>,
    #[serde(default = "default_true")]
    pub remote_ok: bool,
    #[serde(default)]
    pub onsite_ok: bool,
}

impl AvailabilityPatch {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.status == AvailabilityStatus::FromDate && self.earliest_start.is_none() {
            return Err(PayloadError::Invalid(
                "earliest_start required when status == FROM_DATE".into(),
            ));
        }
        if let Some(hours) = self.hours_per_week {
            if !(1..=99).contains(&hours) {
                return Err(PayloadError::Invalid(
                    "hours_per_week must be between 1 and 99".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationPatch {
    pub institution: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field_of_study: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl EducationPatch {
    fn validate(&self) -> Result<(), PayloadError> {
        if let Some(gpa) = self.gpa {
            if !(0.0..=4.0).contains(&gpa) {
                return Err(PayloadError::Invalid("gpa must be between 0.0 and 4.0".into()));
            }
        }
        Ok(())
    }
}

/// Partial intern-profile update; all sections optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub availability: Option<AvailabilityPatch>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub educations: Option<Vec<EducationPatch>>,
}

impl ProfilePatch {
    pub fn from_json(raw: &str) -> Result<Self, PayloadError> {
        let patch: Self = serde_json::from_str(raw)?;
        patch.validate()?;
        Ok(patch)
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if let Some(availability) = &self.availability {
            availability.validate()?;
        }
        for education in self.educations.iter().flatten() {
            education.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.headline.is_none()
            && self.bio.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.country.is_none()
            && self.availability.is_none()
            && self.skills.is_none()
            && self.educations.is_none()
    }
}

/// Partial employer company-profile update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyPatch {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl CompanyPatch {
    pub fn is_empty(&self) -> bool {
        self.company_name.is_none()
            && self.mission.is_none()
            && self.location.is_none()
            && self.website.is_none()
    }
}

/// Listing create/update. An `id` means update-in-place; no `id` means create,
/// which requires title and description, and a location unless remote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPatch {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_remote: Option<bool>,
    #[serde(default)]
    pub requirements: Option<String>,
}

impl ListingPatch {
    pub fn from_json(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// True when an update carries no fields beyond the id (or nothing at all).
    pub fn has_no_changes(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.is_remote.is_none()
            && self.requirements.is_none()
    }

    pub fn validate_create(&self) -> Result<(), PayloadError> {
        if self.title.is_none() || self.description.is_none() {
            return Err(PayloadError::Invalid(
                "title and description are required to create a new internship listing".into(),
            ));
        }
        let remote = self.is_remote.unwrap_or(false);
        let has_location = self.location.as_deref().map(|l| !l.trim().is_empty()).unwrap_or(false);
        if !remote && !has_location {
            return Err(PayloadError::Invalid(
                "location is required for non-remote internships".into(),
            ));
        }
        Ok(())
    }
}
