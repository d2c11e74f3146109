//! Event endpoints.
//!
//! `POST /events` takes the caller identity from `x-user-id` and uses it as
//! the organizer when the body names none. Invalid input is 422, unknown ids
//! are 404.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use herald_events::{Event, EventError, NewEvent};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use crate::auth::{caller_user_id, error_body, ApiError};

pub async fn create_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut input): Json<NewEvent>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    if input.organizer_id.is_none() {
        input.organizer_id = caller_user_id(&headers);
    }
    let event = state.events.create_event(input).await.map_err(event_error)?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn list_events(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Event>>, ApiError> {
    state.events.list_events().map(Json).map_err(event_error)
}

pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    state.events.get_event(&id).map(Json).map_err(event_error)
}

pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.events.delete_event(&id).map_err(event_error)?;
    Ok(StatusCode::NO_CONTENT)
}

fn event_error(e: EventError) -> ApiError {
    if e.is_invalid_input() {
        return error_body(StatusCode::UNPROCESSABLE_ENTITY, e);
    }
    match e {
        EventError::NotFound(_) => error_body(StatusCode::NOT_FOUND, e),
        other => {
            warn!(error = %other, "event request failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, other)
        }
    }
}
