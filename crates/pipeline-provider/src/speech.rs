//! Speech collaborators: text-to-speech for the agent's spoken replies and
//! speech-to-text for the voice endpoints. Synthesis is best-effort at the
//! call sites; errors here never fail a turn.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize `text` into mp3 bytes.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;

    /// Transcribe audio bytes (webm/ogg/mp3) into text.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    tts_model: String,
    stt_model: String,
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tts_model: "gpt-4o-mini-tts".into(),
            stt_model: "whisper-1".into(),
        }
    }

    pub fn with_models(mut self, tts_model: impl Into<String>, stt_model: impl Into<String>) -> Self {
        self.tts_model = tts_model.into();
        self.stt_model = stt_model.into();
        self
    }
}

#[async_trait]
impl SpeechProvider for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.api_base);
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.tts_model,
                "voice": voice,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("tts api error ({status}): {body}"));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.api_base);
        // A filename is required so the API can infer the container format.
        let part = reqwest::multipart::Part::bytes(audio).file_name("speech.webm");
        let form = reqwest::multipart::Form::new()
            .text("model", self.stt_model.clone())
            .part("file", part);

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("stt api error ({status}): {body}"));
        }
        let body: serde_json::Value = resp.json().await?;
        body.get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("stt response missing text field"))
    }
}

/// Test double: fixed bytes/text, or failure on demand.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSpeech {
    pub fail: bool,
}

#[async_trait]
impl SpeechProvider for ScriptedSpeech {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>> {
        if self.fail {
            return Err(anyhow!("synthesis unavailable"));
        }
        Ok(b"mp3-bytes".to_vec())
    }

    async fn transcribe(&self, _audio: Vec<u8>) -> Result<String> {
        if self.fail {
            return Err(anyhow!("transcription unavailable"));
        }
        Ok("transcribed text".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3fake".to_vec()))
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new("sk-test", server.uri());
        let bytes = speech.synthesize("hello", "alloy").await.unwrap();
        assert_eq!(bytes, b"ID3fake");
    }

    #[tokio::test]
    async fn synthesize_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new("sk-test", server.uri());
        assert!(speech.synthesize("hello", "alloy").await.is_err());
    }

    #[tokio::test]
    async fn transcribe_extracts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hi there"})),
            )
            .mount(&server)
            .await;

        let speech = OpenAiSpeech::new("sk-test", server.uri());
        let text = speech.transcribe(vec![1, 2, 3]).await.unwrap();
        assert_eq!(text, "hi there");
    }
}
