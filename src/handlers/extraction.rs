//! # Extraction Job API Handlers
//!
//! Start/stop/run-now control of the background extraction job plus its
//! store-backed status report.

use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, validation_error};
use crate::extraction::{JobStatus, PassSummary};
use crate::server::AppState;

/// Query parameters for starting the job
#[derive(Debug, Deserialize, IntoParams)]
pub struct StartQuery {
    /// Override the configured pass interval, in seconds
    pub interval_seconds: Option<u64>,
}

/// Acknowledgement for start/stop requests
#[derive(Debug, Serialize, ToSchema)]
pub struct JobControlResponse {
    /// Whether this request changed the job's run state
    pub changed: bool,
    /// Whether the job is running after the request
    pub running: bool,
}

/// Start the recurring extraction job
#[utoipa::path(
    post,
    path = "/extraction/start",
    params(StartQuery),
    responses(
        (status = 200, description = "Job started (or already running)", body = JobControlResponse),
        (status = 400, description = "Invalid interval", body = ApiError)
    ),
    tag = "extraction"
)]
pub async fn start(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> Result<Json<JobControlResponse>, ApiError> {
    let interval = match query.interval_seconds {
        Some(0) => {
            return Err(validation_error(
                "interval_seconds must be positive",
                serde_json::json!({"interval_seconds": "must be >= 1"}),
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => None,
    };

    let changed = state.extraction.start(interval);
    Ok(Json(JobControlResponse {
        changed,
        running: state.extraction.is_running(),
    }))
}

/// Stop the recurring extraction job; an in-flight pass finishes
#[utoipa::path(
    post,
    path = "/extraction/stop",
    responses(
        (status = 200, description = "Job stopped (or was not running)", body = JobControlResponse)
    ),
    tag = "extraction"
)]
pub async fn stop(State(state): State<AppState>) -> Json<JobControlResponse> {
    let changed = state.extraction.stop();
    Json(JobControlResponse {
        changed,
        running: state.extraction.is_running(),
    })
}

/// Run a single extraction pass immediately
#[utoipa::path(
    post,
    path = "/extraction/run",
    responses(
        (status = 200, description = "Pass summary", body = PassSummary),
        (status = 500, description = "Pass failed", body = ApiError)
    ),
    tag = "extraction"
)]
pub async fn run(State(state): State<AppState>) -> Result<Json<PassSummary>, ApiError> {
    let summary = state.extraction.run_pass().await.map_err(ApiError::from)?;
    Ok(Json(summary))
}

/// Extraction job status with store-backed aggregates
#[utoipa::path(
    get,
    path = "/extraction/status",
    responses(
        (status = 200, description = "Job status", body = JobStatus)
    ),
    tag = "extraction"
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<JobStatus>, ApiError> {
    let status = state.extraction.status().await.map_err(ApiError::from)?;
    Ok(Json(status))
}
