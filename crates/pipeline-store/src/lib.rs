pub mod migrations;
pub mod models;
pub mod payload;
pub mod store;

pub use models::{
    ApplicantSnapshot, AvailabilitySnapshot, ChatRole, EducationSnapshot, EmployerSnapshot,
    InternshipSnapshot, MessageRecord, ProfileSnapshot, UserRecord, UserRole,
};
pub use payload::{AvailabilityPatch, CompanyPatch, EducationPatch, ListingPatch, PayloadError, ProfilePatch};
pub use store::Store;
