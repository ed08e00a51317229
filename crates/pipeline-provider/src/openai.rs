use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_core::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;

use crate::types::{ChatRequest, StreamEvent};
use crate::{ChatProvider, EventStream};

/// OpenAI-compatible chat-completions provider (streaming only).
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn to_api_request(request: ChatRequest) -> ApiRequest {
        let tools: Vec<serde_json::Value> = request.tools.iter().map(|t| t.to_wire()).collect();
        ApiRequest {
            model: request.model,
            messages: request
                .messages
                .into_iter()
                .map(|m| ApiMessage {
                    role: m.role,
                    content: m.content,
                    tool_calls: if m.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            m.tool_calls
                                .into_iter()
                                .map(|c| {
                                    serde_json::json!({
                                        "id": c.id,
                                        "type": "function",
                                        "function": {"name": c.name, "arguments": c.arguments},
                                    })
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: m.tool_call_id,
                })
                .collect(),
            tools: if tools.is_empty() { None } else { Some(tools) },
            stream: true,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = Self::to_api_request(request);
        tracing::debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            tools = payload.tools.as_ref().map_or(0, Vec::len),
            "requesting chat completion"
        );

        let resp = match self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(format_transport_error(
                    ProviderErrorKind::Timeout,
                    "timeout",
                    "request timed out",
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(format_transport_error(ProviderErrorKind::ServerError, "connect", e));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            tracing::warn!(status = %status, "chat completion request rejected");
            let parsed = serde_json::from_str::<ApiError>(&text).ok();
            return Err(format_api_error(status, parsed));
        }

        Ok(Box::pin(parse_sse_stream(resp.bytes_stream())))
    }
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamEvent>> + Send {
    async_stream::stream! {
        tokio::pin!(byte_stream);
        let mut buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(pos) = buffer.find("\n\n") {
                        let event_text = buffer[..pos].to_string();
                        buffer = buffer[pos + 2..].to_string();

                        for line in event_text.lines() {
                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };

                            if data == "[DONE]" {
                                continue;
                            }

                            match serde_json::from_str::<serde_json::Value>(data) {
                                Ok(event) => {
                                    for parsed in parse_sse_event(&event) {
                                        yield Ok(parsed);
                                    }
                                }
                                Err(e) => {
                                    yield Err(anyhow!("invalid sse event payload: {e}"));
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow!("stream error: {e}"));
                    return;
                }
            }
        }
    }
}

/// One chat-completion chunk can carry text, several tool-call fragments,
/// and/or a finish reason; emit them in wire order.
fn parse_sse_event(event: &serde_json::Value) -> Vec<StreamEvent> {
    let mut out = Vec::new();
    let Some(choice) = event.get("choices").and_then(|c| c.get(0)) else {
        return out;
    };

    if let Some(delta) = choice.get("delta") {
        if let Some(parts) = delta.get("tool_calls").and_then(|t| t.as_array()) {
            for part in parts {
                let Some(index) = part.get("index").and_then(|i| i.as_u64()) else {
                    continue;
                };
                let function = part.get("function");
                out.push(StreamEvent::ToolCallDelta {
                    index: index as u32,
                    id: part
                        .get("id")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    name: function
                        .and_then(|f| f.get("name"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    arguments: function
                        .and_then(|f| f.get("arguments"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                });
            }
        }

        if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
            if !text.is_empty() {
                out.push(StreamEvent::TextDelta(text.to_string()));
            }
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(|r| r.as_str()) {
        out.push(StreamEvent::Done {
            finish_reason: Some(reason.to_string()),
        });
    }

    out
}

/// Errors raised before any HTTP status exists (timeouts, refused
/// connections); same message shape as `format_api_error`.
fn format_transport_error(
    kind: ProviderErrorKind,
    label: &str,
    detail: impl std::fmt::Display,
) -> anyhow::Error {
    let retryable = if kind.is_retryable() { " [retryable]" } else { "" };
    anyhow!("openai api error ({label}){retryable}: {detail}")
}

fn format_api_error(status: StatusCode, parsed: Option<ApiError>) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status);
    let retryable = if kind.is_retryable() { " [retryable]" } else { "" };
    if let Some(api_error) = parsed {
        anyhow!(
            "openai api error ({status}){retryable}: {} ({})",
            api_error.error.message,
            api_error.error.r#type.as_deref().unwrap_or("unknown")
        )
    } else {
        anyhow!("openai api error ({status}){retryable}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    r#type: Option<String>,
    message: String,
}
