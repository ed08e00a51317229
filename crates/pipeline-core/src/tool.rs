//! Tool contract and registry.
//!
//! Every tool declares its calling convention up front instead of being
//! probed at request time, so argument handling is decided once, here,
//! before any tool code runs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use pipeline_provider::ToolSchema;
use serde_json::{json, Value};

/// How a tool expects its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// A single serialized-JSON string under the `payload_json` key.
    PayloadJson,
    /// A JSON object of named parameters, passed through as-is.
    Keyword,
}

/// What a tool hands back to the turn driver.
///
/// `content` becomes the `tool` role transcript message. `notice` is an
/// optional out-of-band string forwarded straight to the output stream
/// (the navigation tool uses it to steer the client).
#[derive(Debug, Clone)]
pub struct ToolReply {
    pub content: String,
    pub notice: Option<String>,
}

impl ToolReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            notice: None,
        }
    }

    pub fn with_notice(content: impl Into<String>, notice: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            notice: Some(notice.into()),
        }
    }
}

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn call_style(&self) -> CallStyle;
    async fn invoke(&self, args: Value) -> Result<ToolReply>;
}

/// Name-keyed set of tools for one agent, bound to one user.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn AgentTool>>) -> Self {
        let order: Vec<String> = tools.iter().map(|t| t.schema().name).collect();
        let tools = tools
            .into_iter()
            .map(|t| (t.schema().name, t))
            .collect();
        Self { tools, order }
    }

    /// Schemas in registration order, for the provider request.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.schema())
            .collect()
    }

    /// Dispatch one reassembled call.
    ///
    /// The raw argument string comes straight off the wire and may not be
    /// JSON at all; a model that skips the double-encoding step sends the
    /// payload bare. That case is wrapped as `{"payload_json": raw}` rather
    /// than rejected.
    pub async fn invoke(&self, name: &str, raw_args: &str) -> Result<ToolReply> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("unknown tool: {name}"))?;

        let parsed: Value = serde_json::from_str(raw_args)
            .unwrap_or_else(|_| json!({ "payload_json": raw_args.trim() }));

        let args = match tool.call_style() {
            CallStyle::PayloadJson => match parsed {
                Value::Object(map) if map.contains_key("payload_json") => Value::Object(map),
                Value::String(s) => json!({ "payload_json": s }),
                other => json!({ "payload_json": other.to_string() }),
            },
            CallStyle::Keyword => match parsed {
                Value::Object(_) => parsed,
                Value::String(s) => json!({ "payload_json": s }),
                other => json!({ "payload_json": other.to_string() }),
            },
        };

        tracing::debug!(tool = name, ?args, "invoking agent tool");
        tool.invoke(args).await
    }
}

/// Read the `payload_json` argument of a `PayloadJson` style tool.
pub(crate) fn payload_str(args: &Value) -> &str {
    args.get("payload_json").and_then(Value::as_str).unwrap_or("")
}

/// True for payloads that cannot carry any fields: empty, `{}`, `null`.
pub(crate) fn payload_is_blank(payload: &str) -> bool {
    matches!(payload.trim(), "" | "{}" | "null")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        style: CallStyle,
    }

    #[async_trait]
    impl AgentTool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo_v1".into(),
                description: "echo arguments back".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        fn call_style(&self) -> CallStyle {
            self.style
        }

        async fn invoke(&self, args: Value) -> Result<ToolReply> {
            Ok(ToolReply::text(args.to_string()))
        }
    }

    fn registry(style: CallStyle) -> ToolRegistry {
        ToolRegistry::new(vec![Arc::new(EchoTool { style })])
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let err = registry(CallStyle::Keyword)
            .invoke("missing_v1", "{}")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_wrapped_as_payload_json() {
        let reply = registry(CallStyle::PayloadJson)
            .invoke("echo_v1", "  city: Boston, not json  ")
            .await
            .unwrap();
        let seen: Value = serde_json::from_str(&reply.content).unwrap();
        assert_eq!(seen["payload_json"], "city: Boston, not json");
    }

    #[tokio::test]
    async fn bare_json_string_becomes_payload_json() {
        let reply = registry(CallStyle::PayloadJson)
            .invoke("echo_v1", r#""{\"city\":\"Boston\"}""#)
            .await
            .unwrap();
        let seen: Value = serde_json::from_str(&reply.content).unwrap();
        assert_eq!(seen["payload_json"], r#"{"city":"Boston"}"#);
    }

    #[tokio::test]
    async fn keyword_object_passes_through() {
        let reply = registry(CallStyle::Keyword)
            .invoke("echo_v1", r#"{"listing_id": 7}"#)
            .await
            .unwrap();
        let seen: Value = serde_json::from_str(&reply.content).unwrap();
        assert_eq!(seen["listing_id"], 7);
    }

    #[tokio::test]
    async fn payload_json_object_passes_through_unchanged() {
        let reply = registry(CallStyle::PayloadJson)
            .invoke("echo_v1", r#"{"payload_json": "{\"a\":1}"}"#)
            .await
            .unwrap();
        let seen: Value = serde_json::from_str(&reply.content).unwrap();
        assert_eq!(seen["payload_json"], r#"{"a":1}"#);
    }

    #[test]
    fn blank_payload_detection() {
        assert!(payload_is_blank(""));
        assert!(payload_is_blank("  {} "));
        assert!(payload_is_blank("null"));
        assert!(!payload_is_blank(r#"{"city":"Boston"}"#));
    }
}
