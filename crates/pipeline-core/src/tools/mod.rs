pub mod employer;
pub mod profile;

pub use employer::{
    CompanyFieldsTool, DeleteListingTool, ListApplicantsTool, ListingFieldsTool, NavigateTool,
};
pub use profile::ProfileFieldsTool;
