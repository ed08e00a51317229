pub mod agent;
pub mod me;
pub mod voice;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/agent", agent::router())
        .nest("/voice", voice::router())
        .merge(me::router())
}
