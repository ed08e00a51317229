//! Read-only snapshot endpoints for the authenticated caller.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pipeline_store::UserRole;

use crate::identity::{current_user, error_response};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/me/", get(profile_me))
        .route("/employer/me/", get(employer_me))
}

async fn profile_me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    if user.role != UserRole::Intern {
        return error_response(StatusCode::FORBIDDEN, "intern account required");
    }

    match state.store.profile_snapshot(user.id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => {
            tracing::error!(user_id = user.id, error = %err, "profile snapshot failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "profile unavailable")
        }
    }
}

async fn employer_me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    if user.role != UserRole::Employer {
        return error_response(StatusCode::FORBIDDEN, "employer account required");
    }

    match state.store.employer_snapshot(user.id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => {
            tracing::error!(user_id = user.id, error = %err, "employer snapshot failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "employer unavailable")
        }
    }
}
