use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use herald_scheduler::Job;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::{error_body, ApiError};

/// GET /jobs: every scheduled job, soonest first.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Job>>, ApiError> {
    state
        .scheduler
        .list_jobs()
        .map(Json)
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    match state.scheduler.get_job(&id) {
        Ok(Some(job)) => Ok(Json(job)),
        Ok(None) => Err(error_body(StatusCode::NOT_FOUND, format!("job not found: {id}"))),
        Err(e) => Err(error_body(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}
