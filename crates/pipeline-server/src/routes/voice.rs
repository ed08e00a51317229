//! Standalone voice endpoints (independent of the agent stream's inline
//! audio).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::prelude::{Engine, BASE64_STANDARD};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::identity::error_response;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tts/", post(tts))
        .route("/stt/", post(stt))
}

#[derive(Deserialize)]
pub struct TtsBody {
    #[serde(default)]
    pub text: String,
    pub voice: Option<String>,
}

async fn tts(State(state): State<AppState>, Json(body): Json<TtsBody>) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    }
    let voice = body.voice.as_deref().unwrap_or(&state.voice);

    match state.speech.synthesize(text, voice).await {
        Ok(audio) => Json(json!({"audio_base64": BASE64_STANDARD.encode(audio)})).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "tts failed");
            error_response(StatusCode::BAD_GATEWAY, "speech synthesis failed")
        }
    }
}

#[derive(Deserialize)]
pub struct SttBody {
    #[serde(default)]
    pub audio_base64: String,
}

async fn stt(State(state): State<AppState>, Json(body): Json<SttBody>) -> Response {
    if body.audio_base64.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "audio_base64 is required");
    }
    let audio = match BASE64_STANDARD.decode(body.audio_base64.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid base64 audio"),
    };

    match state.speech.transcribe(audio).await {
        Ok(text) => Json(json!({"text": text})).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "stt failed");
            error_response(StatusCode::BAD_GATEWAY, "transcription failed")
        }
    }
}
