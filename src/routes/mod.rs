pub mod featured;
pub mod trips;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let media_root = state.config.media_root.clone();
    let body_limit = state.config.body_limit_bytes();
    Router::new()
        .merge(trips::router())
        .merge(featured::router())
        .nest_service("/media", ServeDir::new(media_root))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
