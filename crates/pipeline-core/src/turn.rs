//! The two-pass turn driver.
//!
//! A turn runs as a detached worker task feeding an unbounded channel, so a
//! client that drops the HTTP connection never cancels tool execution
//! mid-write. Pass one streams a draft with tools offered; if the model
//! called tools they run strictly in index order, then pass two streams the
//! final reply with no tools. Exactly one `Done` or `Error` terminates the
//! channel.

use std::sync::Arc;

use anyhow::{Context, Result};
use pipeline_provider::{ChatMessage, ChatProvider, ChatRequest, StreamEvent};
use pipeline_store::{MessageRecord, Store, UserRecord};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::StreamExt;

use crate::agents::AgentDefinition;
use crate::assembler::ToolCallAssembler;
use crate::lock::LockGuard;

/// One unit on the worker→response channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnChunk {
    /// A streamed text delta, forwarded as it arrives.
    Delta(String),
    /// Out-of-band tool notice (already a serialized JSON string).
    Notice(String),
    /// Terminal success marker.
    Done { reply: String, had_tool_calls: bool },
    /// Terminal failure marker; nothing follows it.
    Error(String),
}

#[derive(Clone)]
pub struct TurnContext {
    pub provider: Arc<dyn ChatProvider>,
    pub store: Store,
    pub model: String,
    pub agent: AgentDefinition,
    pub user: UserRecord,
}

/// Spawn the generation worker for one turn.
///
/// The caller has already acquired the user's generation lock and persisted
/// the incoming user message; the guard travels into the worker so release
/// happens on every outcome, including panics unwinding the task.
pub fn spawn_turn(ctx: TurnContext, guard: LockGuard) -> UnboundedReceiver<TurnChunk> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _guard = guard;
        match run_turn(&ctx, &tx).await {
            Ok((reply, had_tool_calls)) => {
                let _ = tx.send(TurnChunk::Done {
                    reply,
                    had_tool_calls,
                });
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(
                    user_id = ctx.user.id,
                    agent = ctx.agent.name,
                    error = %message,
                    "agent turn failed"
                );
                let _ = tx.send(TurnChunk::Error(message));
            }
        }
    });
    rx
}

/// The transcript sent to the model is the system prompt plus the whole
/// conversation flattened into one user message of `User:` / `Assistant:`
/// lines (the latest user message is already persisted, so it is the last
/// line).
fn render_conversation(history: &[MessageRecord]) -> String {
    let mut out = String::new();
    for message in history {
        let speaker = if message.role == "assistant" {
            "Assistant"
        } else {
            "User"
        };
        out.push_str(speaker);
        out.push_str(": ");
        out.push_str(&message.content);
        out.push('\n');
    }
    out.trim_end().to_string()
}

async fn run_turn(ctx: &TurnContext, tx: &UnboundedSender<TurnChunk>) -> Result<(String, bool)> {
    let registry = ctx.agent.registry(&ctx.store, &ctx.user);
    let history = ctx.store.list_messages(ctx.user.id).await?;
    let mut transcript = vec![
        ChatMessage::system(ctx.agent.system_prompt),
        ChatMessage::user(render_conversation(&history)),
    ];

    // Draft pass: tools offered. Deltas are forwarded immediately and also
    // buffered; the buffer only becomes the reply if no tool was called.
    let request =
        ChatRequest::new(&ctx.model, transcript.clone()).with_tools(registry.schemas());
    let mut stream = ctx.provider.stream_chat(request).await?;
    let mut candidate = String::new();
    let mut assembler = ToolCallAssembler::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => {
                let _ = tx.send(TurnChunk::Delta(delta.clone()));
                candidate.push_str(&delta);
            }
            StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => assembler.absorb(index, id, name, arguments),
            StreamEvent::Done { .. } => {}
        }
    }

    if !assembler.has_named_calls() {
        return Ok((candidate, false));
    }
    let calls = assembler.finish();

    // Tools were called: the draft text was provisional commentary and does
    // not survive into history. Execute each call in order, one atomic
    // domain write per tool; the first failure aborts the turn here.
    tracing::info!(
        user_id = ctx.user.id,
        agent = ctx.agent.name,
        calls = calls.len(),
        "executing tool calls"
    );
    transcript.push(ChatMessage::assistant_tool_calls(calls.clone()));
    for call in &calls {
        let reply = registry
            .invoke(&call.name, &call.arguments)
            .await
            .with_context(|| format!("tool {} failed", call.name))?;
        if let Some(notice) = reply.notice {
            let _ = tx.send(TurnChunk::Notice(notice));
        }
        transcript.push(ChatMessage::tool_result(&call.id, reply.content));
    }

    // Final pass: updated transcript, no tools.
    let mut stream = ctx
        .provider
        .stream_chat(ChatRequest::new(&ctx.model, transcript))
        .await?;
    let mut reply = String::new();
    while let Some(event) = stream.next().await {
        if let StreamEvent::TextDelta(delta) = event? {
            let _ = tx.send(TurnChunk::Delta(delta.clone()));
            reply.push_str(&delta);
        }
    }
    Ok((reply, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::GenerationLocks;
    use pipeline_provider::ScriptedProvider;
    use pipeline_store::{ChatRole, UserRole};

    fn frag(index: u32, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> StreamEvent {
        StreamEvent::ToolCallDelta {
            index,
            id: id.map(Into::into),
            name: name.map(Into::into),
            arguments: args.map(Into::into),
        }
    }

    fn done() -> StreamEvent {
        StreamEvent::Done {
            finish_reason: Some("tool_calls".into()),
        }
    }

    async fn setup(role: UserRole, agent: AgentDefinition) -> (TurnContext, Arc<ScriptedProvider>, GenerationLocks) {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("someone@example.com", role).await.unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        let locks = GenerationLocks::new();
        let ctx = TurnContext {
            provider: provider.clone(),
            store,
            model: "test-model".into(),
            agent,
            user,
        };
        (ctx, provider, locks)
    }

    async fn start(
        ctx: &TurnContext,
        locks: &GenerationLocks,
        message: &str,
    ) -> UnboundedReceiver<TurnChunk> {
        ctx.store
            .append_message(ctx.user.id, ChatRole::User, message)
            .await
            .unwrap();
        assert!(locks.try_acquire(ctx.user.id));
        spawn_turn(ctx.clone(), LockGuard::new(locks.clone(), ctx.user.id))
    }

    async fn drain(mut rx: UnboundedReceiver<TurnChunk>) -> Vec<TurnChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    #[tokio::test]
    async fn simple_reply_no_tools() {
        let (ctx, provider, locks) = setup(UserRole::Intern, AgentDefinition::profile_builder()).await;
        provider.push_text_reply("Hello! What is your headline?");

        let chunks = drain(start(&ctx, &locks, "hi").await).await;

        let mut streamed = String::new();
        let mut terminal = None;
        for chunk in chunks {
            match chunk {
                TurnChunk::Delta(d) => streamed.push_str(&d),
                other => {
                    assert!(terminal.is_none(), "only one terminal chunk allowed");
                    terminal = Some(other);
                }
            }
        }
        match terminal.unwrap() {
            TurnChunk::Done {
                reply,
                had_tool_calls,
            } => {
                assert_eq!(reply, "Hello! What is your headline?");
                assert_eq!(reply, streamed);
                assert!(!had_tool_calls);
            }
            other => panic!("expected Done, got {other:?}"),
        }
        // worker finished, lock is free again
        assert!(locks.try_acquire(ctx.user.id));
    }

    #[tokio::test]
    async fn tool_turn_writes_and_discards_draft_text() {
        let (ctx, provider, locks) = setup(UserRole::Intern, AgentDefinition::profile_builder()).await;
        // draft pass: commentary plus a call split across fragments
        provider.push_script(vec![
            StreamEvent::TextDelta("Saving that now.".into()),
            frag(0, Some("call_1"), Some("set_profile_fields_v1"), None),
            frag(0, None, None, Some(r#"{"payload_json": "{\"ci"#)),
            frag(0, None, None, Some(r#"ty\": \"Boston\"}"}"#)),
            done(),
        ]);
        provider.push_text_reply("Your city is set to Boston!");

        let chunks = drain(start(&ctx, &locks, "I live in Boston").await).await;

        let terminal = chunks.last().unwrap().clone();
        match terminal {
            TurnChunk::Done {
                reply,
                had_tool_calls,
            } => {
                assert_eq!(reply, "Your city is set to Boston!");
                assert!(had_tool_calls);
                // draft commentary was streamed but never became the reply
                assert!(!reply.contains("Saving that now."));
            }
            other => panic!("expected Done, got {other:?}"),
        }

        let snapshot = ctx.store.profile_snapshot(ctx.user.id).await.unwrap();
        assert_eq!(snapshot.city, "Boston");
    }

    #[tokio::test]
    async fn notice_is_forwarded_before_done() {
        let (ctx, provider, locks) =
            setup(UserRole::Employer, AgentDefinition::employer_assistant()).await;
        provider.push_script(vec![
            frag(0, Some("call_1"), Some("navigate_to_v1"), Some(r#"{"path": "/employer/profile"}"#)),
            done(),
        ]);
        provider.push_text_reply("Opening your profile page.");

        let chunks = drain(start(&ctx, &locks, "open my profile").await).await;

        let notice_at = chunks
            .iter()
            .position(|c| matches!(c, TurnChunk::Notice(_)))
            .expect("a notice chunk");
        let done_at = chunks
            .iter()
            .position(|c| matches!(c, TurnChunk::Done { .. }))
            .expect("a done chunk");
        assert!(notice_at < done_at);
        if let TurnChunk::Notice(notice) = &chunks[notice_at] {
            let value: serde_json::Value = serde_json::from_str(notice).unwrap();
            assert_eq!(value["navigate"], "/employer/profile");
        }
    }

    #[tokio::test]
    async fn provider_failure_yields_single_error() {
        let (ctx, _provider, locks) =
            setup(UserRole::Intern, AgentDefinition::profile_builder()).await;
        // no scripts pushed: the provider fails on first call

        let chunks = drain(start(&ctx, &locks, "hi").await).await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], TurnChunk::Error(msg) if msg.contains("no more scripts")));
        assert!(locks.try_acquire(ctx.user.id));
    }

    #[tokio::test]
    async fn tool_error_aborts_the_turn() {
        let (ctx, provider, locks) =
            setup(UserRole::Employer, AgentDefinition::employer_assistant()).await;
        provider.push_script(vec![
            frag(0, Some("call_1"), Some("delete_internship_v1"), Some(r#"{"listing_id": 999}"#)),
            done(),
        ]);

        let chunks = drain(start(&ctx, &locks, "delete listing 999").await).await;

        match chunks.last().unwrap() {
            TurnChunk::Error(msg) => {
                assert!(msg.contains("delete_internship_v1"));
                assert!(msg.contains("No internship found"));
            }
            other => panic!("expected Error, got {other:?}"),
        }
        assert!(locks.try_acquire(ctx.user.id));
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_cancel_the_worker() {
        let (ctx, provider, locks) =
            setup(UserRole::Intern, AgentDefinition::profile_builder()).await;
        provider.push_script(vec![
            frag(
                0,
                Some("call_1"),
                Some("set_profile_fields_v1"),
                Some(r#"{"payload_json": "{\"city\": \"Boston\"}"}"#),
            ),
            done(),
        ]);
        provider.push_text_reply("Saved.");

        let rx = start(&ctx, &locks, "I live in Boston").await;
        drop(rx);

        // lock release marks the worker as finished; wait it out
        let mut finished = false;
        for _ in 0..100 {
            if locks.try_acquire(ctx.user.id) {
                finished = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(finished, "worker never released the lock");

        let snapshot = ctx.store.profile_snapshot(ctx.user.id).await.unwrap();
        assert_eq!(snapshot.city, "Boston");
    }

    #[tokio::test]
    async fn history_lines_reach_the_conversation_block() {
        let history = vec![
            MessageRecord {
                role: "user".into(),
                content: "hi".into(),
                created_at: chrono::Utc::now(),
            },
            MessageRecord {
                role: "assistant".into(),
                content: "hello!".into(),
                created_at: chrono::Utc::now(),
            },
            MessageRecord {
                role: "user".into(),
                content: "set my city to Boston".into(),
                created_at: chrono::Utc::now(),
            },
        ];
        assert_eq!(
            render_conversation(&history),
            "User: hi\nAssistant: hello!\nUser: set my city to Boston"
        );
    }
}
