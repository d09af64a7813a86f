use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

use crate::{
    auth::AdminGate, error::AppError, services::featured, state::AppState, submission,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/featured", get(list_featured).post(create_featured))
        .route("/featured/:id", put(update_featured).delete(delete_featured))
}

async fn list_featured(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let banners = featured::list_banners(&state).await?;
    Ok(Json(banners))
}

async fn create_featured(
    State(state): State<AppState>,
    _gate: AdminGate,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let submission = submission::parse_featured(multipart, state.config.max_upload_bytes).await?;
    let banner = featured::create_banner(&state, submission).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": banner.id }))))
}

async fn update_featured(
    State(state): State<AppState>,
    _gate: AdminGate,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let submission = submission::parse_featured(multipart, state.config.max_upload_bytes).await?;
    let banner = featured::update_banner(&state, &id, submission).await?;
    Ok(Json(json!({ "id": banner.id })))
}

async fn delete_featured(
    State(state): State<AppState>,
    _gate: AdminGate,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    featured::delete_banner(&state, &id).await?;
    Ok(Json(json!({ "id": id })))
}
