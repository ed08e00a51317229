pub mod openai;
pub mod speech;
pub mod types;

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use futures_core::Stream;
use tokio_stream::iter as stream_iter;

pub use openai::OpenAiProvider;
pub use speech::{OpenAiSpeech, ScriptedSpeech, SpeechProvider};
pub use types::{ChatMessage, ChatRequest, StreamEvent, ToolCallSpec, ToolSchema};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// A chat-completion backend that can stream token and tool-call deltas.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream>;
}

/// Test provider that replays pre-scripted event sequences, one per call.
///
/// A turn with tools makes two provider calls (draft + final), so scripts are
/// queued and popped in order. An exhausted script queue yields an error,
/// which surfaces exactly like a provider failure.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, events: Vec<StreamEvent>) {
        self.scripts
            .lock()
            .expect("script queue poisoned")
            .push_back(events);
    }

    /// Convenience: a script that streams `text` word by word, then ends.
    pub fn push_text_reply(&self, text: &str) {
        let mut events: Vec<StreamEvent> = text
            .split_inclusive(' ')
            .map(|w| StreamEvent::TextDelta(w.to_string()))
            .collect();
        events.push(StreamEvent::Done {
            finish_reason: Some("stop".into()),
        });
        self.push_script(events);
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, _request: ChatRequest) -> Result<EventStream> {
        let events = self
            .scripts
            .lock()
            .expect("script queue poisoned")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted provider has no more scripts"))?;
        let items: Vec<Result<StreamEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream_iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new();
        provider.push_text_reply("hello there");
        provider.push_text_reply("second turn");

        let mut first = provider
            .stream_chat(ChatRequest::new("m", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        let mut collected = String::new();
        while let Some(event) = first.next().await {
            if let StreamEvent::TextDelta(delta) = event.unwrap() {
                collected.push_str(&delta);
            }
        }
        assert_eq!(collected, "hello there");

        let mut second = provider
            .stream_chat(ChatRequest::new("m", vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        let mut collected = String::new();
        while let Some(event) = second.next().await {
            if let StreamEvent::TextDelta(delta) = event.unwrap() {
                collected.push_str(&delta);
            }
        }
        assert_eq!(collected, "second turn");
    }

    #[tokio::test]
    async fn scripted_provider_exhausted_errors() {
        let provider = ScriptedProvider::new();
        let err = provider
            .stream_chat(ChatRequest::new("m", vec![]))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no more scripts"));
    }
}
