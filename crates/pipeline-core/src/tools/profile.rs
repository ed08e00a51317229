//! Intern-side tool: persist profile fields.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pipeline_provider::ToolSchema;
use pipeline_store::{ProfilePatch, Store};
use serde_json::{json, Value};

use crate::tool::{payload_is_blank, payload_str, AgentTool, CallStyle, ToolReply};

/// `set_profile_fields_v1` — partial update of the calling intern's profile.
pub struct ProfileFieldsTool {
    store: Store,
    user_id: i64,
}

impl ProfileFieldsTool {
    pub fn new(store: Store, user_id: i64) -> Self {
        Self { store, user_id }
    }
}

#[async_trait]
impl AgentTool for ProfileFieldsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "set_profile_fields_v1".into(),
            description: "Persist profile fields for the current user (partial updates allowed). \
                          Send the data as a JSON string via payload_json: headline, bio, city, \
                          state, country, availability, skills, educations."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "payload_json": {
                        "type": "string",
                        "description": "JSON-encoded profile fields to save"
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
        tracing::info!(user_id = self.user_id, payload, "profile tool payload");
        if payload_is_blank(payload) {
            return Ok(ToolReply::text("no_changes"));
        }

        let patch = ProfilePatch::from_json(payload).map_err(|e| anyhow!("{e}"))?;
        if patch.is_empty() {
            return Ok(ToolReply::text("no_changes"));
        }

        self.store.apply_profile_patch(self.user_id, patch).await?;
        tracing::info!(user_id = self.user_id, "profile saved");
        Ok(ToolReply::text("profile_updated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_store::UserRole;

    async fn tool() -> (Store, ProfileFieldsTool, i64) {
        let store = Store::open_in_memory().unwrap();
        let user = store
            .create_user("intern@example.com", UserRole::Intern)
            .await
            .unwrap();
        (store.clone(), ProfileFieldsTool::new(store, user.id), user.id)
    }

    #[tokio::test]
    async fn saves_partial_profile() {
        let (store, tool, user_id) = tool().await;
        let reply = tool
            .invoke(json!({"payload_json": r#"{"city": "Boston", "headline": "CS student"}"#}))
            .await
            .unwrap();
        assert_eq!(reply.content, "profile_updated");
        assert!(reply.notice.is_none());

        let snapshot = store.profile_snapshot(user_id).await.unwrap();
        assert_eq!(snapshot.city, "Boston");
        assert_eq!(snapshot.headline, "CS student");
    }

    #[tokio::test]
    async fn blank_payload_writes_nothing() {
        let (_, tool, _) = tool().await;
        for payload in ["", "{}", "null", "  "] {
            let reply = tool.invoke(json!({"payload_json": payload})).await.unwrap();
            assert_eq!(reply.content, "no_changes");
        }
    }

    #[tokio::test]
    async fn invalid_payload_is_a_tool_error() {
        let (_, tool, _) = tool().await;
        let err = tool
            .invoke(json!({"payload_json": r#"{"availability": {"status": "FROM_DATE"}}"#}))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("earliest_start"));
    }
}
