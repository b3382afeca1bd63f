// handlers/elevated/admin/jobs.rs - maintenance jobs on demand
//
// GET  /api/admin/jobs
// POST /api/admin/jobs/:job/run

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::error::ApiError;
use crate::jobs::{self, JobKind, JobReport};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobInfo {
    pub name: JobKind,
    pub description: &'static str,
    pub interval_secs: u64,
    pub running: bool,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<JobInfo>> {
    let jobs = JobKind::ALL
        .into_iter()
        .map(|kind| JobInfo {
            name: kind,
            description: kind.description(),
            interval_secs: kind.interval(&state.config().jobs).as_secs(),
            running: state.job_guards().is_running(kind),
        })
        .collect();
    Ok(ApiResponse::success(jobs))
}

/// Run a job now. A run that finds the job already in progress reports
/// `"skipped": true` instead of waiting.
pub async fn run(
    State(state): State<AppState>,
    job: Result<Path<String>, PathRejection>,
) -> ApiResult<JobReport> {
    let Path(job) = job?;
    let kind: JobKind = job.parse().map_err(ApiError::not_found)?;
    Ok(ApiResponse::success(jobs::run_job(&state, kind).await?))
}
