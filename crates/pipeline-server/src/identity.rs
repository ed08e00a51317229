//! Caller identity resolution.
//!
//! Authentication proper (JWT issuing, session cookies) sits in front of
//! this service; the `x-user-email` header is its narrow hand-off. An
//! unknown or missing identity is a 401 here.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipeline_store::UserRecord;
use serde_json::json;

use crate::state::AppState;

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, Response> {
    let email = headers
        .get("x-user-email")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim();
    if email.is_empty() {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "authentication required",
        ));
    }

    match state.store.user_by_email(email).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, "unknown user")),
        Err(err) => {
            tracing::error!(error = %err, "identity lookup failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store unavailable",
            ))
        }
    }
}
