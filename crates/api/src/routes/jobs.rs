//! On-demand job triggers.
//!
//! Both triggers go through the shared [`worker::JobRunner`], so a request
//! that arrives during a scheduled run waits for it to finish.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;
use worker::{JobKind, JobRunRecord};

use crate::response::{AggregateResponse, ApiError, PurgeResponse};
use crate::state::AppState;

/// Query parameters for `POST /jobs/purge`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PurgeParams {
    /// Overrides the configured retention horizon
    #[validate(range(min = 1, max = 3650))]
    pub retention_days: Option<u32>,
}

/// POST /jobs/aggregate
pub async fn aggregate_handler(
    State(state): State<AppState>,
) -> Result<Json<AggregateResponse>, ApiError> {
    info!("Aggregation triggered on demand");
    let result = state.runner.run_aggregate().await?;
    Ok(Json(result.into()))
}

/// POST /jobs/purge?retention_days=N
pub async fn purge_handler(
    State(state): State<AppState>,
    params: Result<Query<PurgeParams>, QueryRejection>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    params
        .validate()
        .map_err(|e| ApiError::validation(vec![e.to_string()]))?;

    info!(retention_days = ?params.retention_days, "Purge triggered on demand");
    let result = state.runner.run_purge(params.retention_days).await?;
    Ok(Json(result.into()))
}

/// GET /runs/:job - last recorded run of a job.
pub async fn last_run_handler(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<JobRunRecord>, ApiError> {
    let job: JobKind = job.parse()?;

    match state.runner.last_run(job).await? {
        Some(run) => Ok(Json(run)),
        None => Err(ApiError::not_found(format!("{job} has not run yet"))),
    }
}
