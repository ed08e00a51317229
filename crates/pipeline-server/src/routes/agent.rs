//! Streaming agent endpoints.
//!
//! `POST .../{agent}/` answers with newline-delimited JSON: zero or more
//! `{"delta", "done": false}` lines while the worker generates, then exactly
//! one terminal line — `{"delta": "", "done": true, ...}` on success (with
//! optional `audio_base64` and a refreshed `profile`/`employer` snapshot
//! after tool calls) or `{"error": ...}` on failure.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::prelude::{Engine, BASE64_STANDARD};
use bytes::Bytes;
use pipeline_core::{spawn_turn, AgentDefinition, AgentKind, LockGuard, TurnChunk, TurnContext};
use pipeline_store::{ChatRole, UserRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::identity::{current_user, error_response};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile-builder/", post(profile_builder))
        .route("/profile-builder/history/", get(profile_builder_history))
        .route("/employer-assistant/", post(employer_assistant))
        .route("/employer-assistant/history/", get(employer_assistant_history))
}

#[derive(Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub message: String,
}

async fn profile_builder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AgentMessage>,
) -> Response {
    run_agent(state, headers, AgentDefinition::profile_builder(), body).await
}

async fn employer_assistant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AgentMessage>,
) -> Response {
    run_agent(state, headers, AgentDefinition::employer_assistant(), body).await
}

async fn profile_builder_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    history(state, headers, AgentDefinition::profile_builder()).await
}

async fn employer_assistant_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    history(state, headers, AgentDefinition::employer_assistant()).await
}

fn check_audience(user: &UserRecord, agent: &AgentDefinition) -> Result<(), Response> {
    if user.role != agent.audience {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "this agent is not available for your role",
        ));
    }
    Ok(())
}

async fn run_agent(
    state: AppState,
    headers: HeaderMap,
    agent: AgentDefinition,
    body: AgentMessage,
) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    if let Err(response) = check_audience(&user, &agent) {
        return response;
    }

    let message = body.message.trim().to_string();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message is required");
    }

    if !state.locks.try_acquire(user.id) {
        return error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Agent is already generating a reply, please wait.",
        );
    }
    let guard = LockGuard::new(state.locks.clone(), user.id);

    // The user message is part of history before generation starts; it stays
    // even if the turn later fails.
    if let Err(err) = state
        .store
        .append_message(user.id, ChatRole::User, &message)
        .await
    {
        tracing::error!(user_id = user.id, error = %err, "failed to persist user message");
        drop(guard);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to persist message",
        );
    }

    tracing::info!(user_id = user.id, agent = agent.name, "agent turn started");
    let ctx = TurnContext {
        provider: state.provider.clone(),
        store: state.store.clone(),
        model: state.model.clone(),
        agent,
        user: user.clone(),
    };
    let rx = spawn_turn(ctx, guard);
    stream_response(state, agent, user, rx)
}

fn ndjson_line(value: Value) -> Bytes {
    let mut line = value.to_string();
    line.push('\n');
    Bytes::from(line)
}

/// Bridge the worker channel onto the HTTP response. A client that
/// disconnects mid-stream drops this consumer, so the finalizer (and the
/// assistant-message persist) is skipped; the worker keeps running, so tool
/// writes complete and the lock guard is released.
fn stream_response(
    state: AppState,
    agent: AgentDefinition,
    user: UserRecord,
    mut rx: UnboundedReceiver<TurnChunk>,
) -> Response {
    let body_stream = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            match chunk {
                TurnChunk::Delta(delta) => {
                    yield Ok::<_, Infallible>(ndjson_line(json!({"delta": delta, "done": false})));
                }
                TurnChunk::Notice(notice) => {
                    yield Ok(ndjson_line(json!({"delta": notice, "done": false})));
                }
                TurnChunk::Done { reply, had_tool_calls } => {
                    let terminal = finalize_turn(&state, agent, &user, &reply, had_tool_calls).await;
                    yield Ok(ndjson_line(terminal));
                    break;
                }
                TurnChunk::Error(message) => {
                    yield Ok(ndjson_line(json!({"error": message})));
                    break;
                }
            }
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(body_stream),
    )
        .into_response()
}

/// Success-path side effects, in order: persist the assistant reply,
/// best-effort speech synthesis, snapshot refresh after tool writes.
async fn finalize_turn(
    state: &AppState,
    agent: AgentDefinition,
    user: &UserRecord,
    reply: &str,
    had_tool_calls: bool,
) -> Value {
    if let Err(err) = state
        .store
        .append_message(user.id, ChatRole::Assistant, reply)
        .await
    {
        tracing::error!(user_id = user.id, error = %err, "failed to persist assistant reply");
        return json!({"error": "failed to persist reply"});
    }

    let mut terminal = json!({"delta": "", "done": true});

    if !reply.is_empty() {
        match state.speech.synthesize(reply, &state.voice).await {
            Ok(audio) => {
                terminal["audio_base64"] = Value::String(BASE64_STANDARD.encode(audio));
            }
            // text-only turn, never a failure
            Err(err) => {
                tracing::warn!(user_id = user.id, error = %err, "speech synthesis failed");
            }
        }
    }

    if had_tool_calls {
        match agent.kind {
            AgentKind::ProfileBuilder => match state.store.profile_snapshot(user.id).await {
                Ok(snapshot) => match serde_json::to_value(&snapshot) {
                    Ok(value) => terminal["profile"] = value,
                    Err(err) => tracing::error!(error = %err, "profile snapshot serialization"),
                },
                Err(err) => {
                    tracing::error!(user_id = user.id, error = %err, "profile snapshot reload failed");
                }
            },
            AgentKind::EmployerAssistant => match state.store.employer_snapshot(user.id).await {
                Ok(snapshot) => match serde_json::to_value(&snapshot) {
                    Ok(value) => terminal["employer"] = value,
                    Err(err) => tracing::error!(error = %err, "employer snapshot serialization"),
                },
                Err(err) => {
                    tracing::error!(user_id = user.id, error = %err, "employer snapshot reload failed");
                }
            },
        }
    }

    tracing::info!(user_id = user.id, agent = agent.name, had_tool_calls, "agent turn finished");
    terminal
}

async fn history(state: AppState, headers: HeaderMap, agent: AgentDefinition) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    if let Err(response) = check_audience(&user, &agent) {
        return response;
    }

    match state.store.list_messages(user.id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(err) => {
            tracing::error!(user_id = user.id, error = %err, "history lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "history unavailable")
        }
    }
}
