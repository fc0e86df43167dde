//! Job submission and management endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use greenhop_core::{Job, JobId, JobRequest, NewJob};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{id}", get(get_job).delete(delete_job))
        .route("/{id}/stop", put(stop_job))
}

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    status: &'static str,
    deleted: bool,
}

fn parse_id(id: &str) -> Result<JobId, ApiError> {
    Ok(id.parse::<JobId>()?)
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let jobs = state.store.list_page(query.skip, query.limit).await?;
    Ok(Json(jobs))
}

async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<Job>, ApiError> {
    let Json(request) = payload?;
    let spec = NewJob::parse(request, &state.default_region)?;
    let job = state.store.create(spec).await?;

    info!(
        job_id = %job.id,
        name = %job.name,
        priority = %job.priority,
        region = %job.requested_region,
        energy_usage = job.energy_usage_kwh,
        "Job submitted"
    );
    Ok(Json(job))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job = state.store.get(parse_id(&id)?).await?;
    Ok(Json(job))
}

async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job = state.store.stop(parse_id(&id)?).await?;
    info!(job_id = %job.id, status = %job.status, "Stop requested");
    Ok(Json(job))
}

async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state.store.delete(id).await?;
    if deleted {
        info!(job_id = %id, "Job deleted");
    }
    Ok(Json(DeleteResponse {
        status: "success",
        deleted,
    }))
}
