use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::AdminGate, error::AppError, services::programs, state::AppState, submission,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route(
            "/trips/:id",
            get(get_trip).put(update_trip).delete(delete_trip),
        )
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    all: bool,
}

async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    admin: Option<AdminGate>,
) -> Result<impl IntoResponse, AppError> {
    // The unfiltered listing backs the admin dashboard.
    if query.all && admin.is_none() {
        return Err(AppError::Unauthorized);
    }
    let trips = state.trips.list(query.all).await?;
    Ok(Json(trips))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let trip = state.trips.get(&id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(trip))
}

async fn create_trip(
    State(state): State<AppState>,
    _gate: AdminGate,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let submission = submission::parse_program(multipart, state.config.max_upload_bytes).await?;
    let trip = programs::create_program(&state, submission).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": trip.id }))))
}

async fn update_trip(
    State(state): State<AppState>,
    _gate: AdminGate,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let submission = submission::parse_program(multipart, state.config.max_upload_bytes).await?;
    let trip = programs::update_program(&state, &id, submission).await?;
    Ok(Json(json!({ "id": trip.id })))
}

async fn delete_trip(
    State(state): State<AppState>,
    _gate: AdminGate,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    programs::delete_program(&state, &id).await?;
    Ok(Json(json!({ "id": id })))
}
