//! Employer-side tools: company profile, internship listings, applicants,
//! and client navigation.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use pipeline_provider::ToolSchema;
use pipeline_store::{CompanyPatch, ListingPatch, Store};
use serde_json::{json, Value};

use crate::tool::{payload_is_blank, payload_str, AgentTool, CallStyle, ToolReply};

fn string_field(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `set_company_fields_v1` — partial update of the company profile.
///
/// Models are loose with field names here, so a small alias map normalizes
/// `name`/`companyName` style keys before validation; unknown keys are
/// silently ignored.
pub struct CompanyFieldsTool {
    store: Store,
    user_id: i64,
}

impl CompanyFieldsTool {
    pub fn new(store: Store, user_id: i64) -> Self {
        Self { store, user_id }
    }
}

#[async_trait]
impl AgentTool for CompanyFieldsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "set_company_fields_v1".into(),
            description: "Create or update the employer's company profile (partial updates \
                          allowed). Send the data as a JSON string via payload_json: \
                          company_name, mission, location, website."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "payload_json": {
                        "type": "string",
                        "description": "JSON-encoded company fields to save"
                    }
                }
            }),
        }
    }

    fn call_style(&self) -> CallStyle {
        CallStyle::PayloadJson
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply> {
        let payload = payload_str(&args);
        tracing::info!(user_id = self.user_id, payload, "company tool payload");
        if payload_is_blank(payload) {
            return Ok(ToolReply::text("no_changes"));
        }

        let raw: Value = serde_json::from_str(payload)?;
        let Value::Object(map) = raw else {
            bail!("company payload must be a JSON object");
        };

        let mut patch = CompanyPatch::default();
        for (key, value) in map {
            match key.as_str() {
                "name" | "companyName" | "company_name" => patch.company_name = string_field(value),
                "mission" | "missionStatement" | "mission_statement" => {
                    patch.mission = string_field(value)
                }
                "location" => patch.location = string_field(value),
                "website" => patch.website = string_field(value),
                _ => {}
            }
        }
        if patch.is_empty() {
            return Ok(ToolReply::text("no_changes"));
        }

        self.store.apply_company_patch(self.user_id, patch).await?;
        tracing::info!(user_id = self.user_id, "company profile saved");
        Ok(ToolReply::text("company_profile_updated"))
    }
}

/// `set_internship_fields_v1` — create a listing (no id) or update one of the
/// caller's listings (id present).
pub struct ListingFieldsTool {
    store: Store,
    user_id: i64,
}

impl ListingFieldsTool {
    pub fn new(store: Store, user_id: i64) -> Self {
        Self { store, user_id }
    }
}

#[async_trait]
impl AgentTool for ListingFieldsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "set_internship_fields_v1".into(),
            description: "Create or update an internship listing. Provide an 'id' to update an \
                          existing listing, or omit 'id' to create a new one. Send the data as a \
                          JSON string via payload_json: id, title, description, location, \
                          is_remote, requirements."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "payload_json": {
                        "type": "string",
                        "description": "JSON-encoded listing fields to save"
                    }
                }
            }),
        }
    }

    fn call_style(&self) -> CallStyle {
        CallStyle::PayloadJson
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply> {
        let payload = payload_str(&args);
        tracing::info!(user_id = self.user_id, payload, "listing tool payload");
        if payload_is_blank(payload) {
            return Ok(ToolReply::text("no_changes"));
        }

        let patch = ListingPatch::from_json(payload).map_err(|e| anyhow!("{e}"))?;
        if patch.has_no_changes() {
            return Ok(ToolReply::text("no_changes"));
        }

        let (id, created) = self.store.upsert_listing(self.user_id, patch).await?;
        tracing::info!(user_id = self.user_id, listing_id = id, created, "listing saved");
        Ok(ToolReply::text(if created {
            "listing_created"
        } else {
            "listing_updated"
        }))
    }
}

fn listing_id_arg(args: &Value) -> Result<i64> {
    args.get("listing_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("listing_id is required"))
}

/// `list_applicants_v1` — applicants for one of the caller's listings. The
/// applicant rows ride back in the tool result so the model can summarize
/// them.
pub struct ListApplicantsTool {
    store: Store,
    user_id: i64,
}

impl ListApplicantsTool {
    pub fn new(store: Store, user_id: i64) -> Self {
        Self { store, user_id }
    }
}

#[async_trait]
impl AgentTool for ListApplicantsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "list_applicants_v1".into(),
            description: "List applicants for one of the employer's internship listings.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "listing_id": {
                        "type": "integer",
                        "description": "Id of the listing to inspect"
                    }
                }
            }),
        }
    }

    fn call_style(&self) -> CallStyle {
        CallStyle::Keyword
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply> {
        let listing_id = listing_id_arg(&args)?;
        let applicants = self.store.list_applicants(self.user_id, listing_id).await?;
        let applications = serde_json::to_string(&applicants)?;
        tracing::info!(
            user_id = self.user_id,
            listing_id,
            count = applicants.len(),
            "applicants listed"
        );
        Ok(ToolReply::text(format!(
            "applicants_listed | applications={applications}"
        )))
    }
}

/// `delete_internship_v1` — delete one of the caller's listings.
pub struct DeleteListingTool {
    store: Store,
    user_id: i64,
}

impl DeleteListingTool {
    pub fn new(store: Store, user_id: i64) -> Self {
        Self { store, user_id }
    }
}

#[async_trait]
impl AgentTool for DeleteListingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "delete_internship_v1".into(),
            description: "Delete one of the employer's internship listings.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "listing_id": {
                        "type": "integer",
                        "description": "Id of the listing to delete"
                    }
                }
            }),
        }
    }

    fn call_style(&self) -> CallStyle {
        CallStyle::Keyword
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply> {
        let listing_id = listing_id_arg(&args)?;
        let (id, title) = self.store.delete_listing(self.user_id, listing_id).await?;
        tracing::info!(user_id = self.user_id, listing_id = id, %title, "listing deleted");
        Ok(ToolReply::text("listing_deleted"))
    }
}

/// `navigate_to_v1` — tell the client to open a different page. Pure
/// side-channel: the DB is untouched and the model just sees "ok".
pub struct NavigateTool;

#[async_trait]
impl AgentTool for NavigateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "navigate_to_v1".into(),
            description: "Tell the front-end to open a different page, e.g. /employer/profile."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Client route to open"
                    }
                }
            }),
        }
    }

    fn call_style(&self) -> CallStyle {
        CallStyle::Keyword
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("path is required"))?;
        tracing::info!(path, "navigate requested");
        Ok(ToolReply::with_notice(
            "ok",
            json!({ "navigate": path }).to_string(),
        ))
    }
}
