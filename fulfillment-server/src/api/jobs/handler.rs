//! Deferred Job API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use shared::order::{DeferredJob, JobFilter, JobKind};

use crate::core::ServerState;
use crate::orders::TickReport;
use crate::utils::{AppError, AppResult, ErrorCode};

pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<JobFilter>,
) -> AppResult<Json<Vec<DeferredJob>>> {
    Ok(Json(state.scheduler.list_jobs(&filter)?))
}

/// Run a scheduler pass now
pub async fn run_now(State(state): State<ServerState>) -> AppResult<Json<TickReport>> {
    Ok(Json(state.scheduler.tick()?))
}

#[derive(Debug, Serialize)]
pub struct CancelledJob {
    pub job_id: u64,
}

/// Withdraw the pending job of a kind for an order
pub async fn cancel_for_order(
    State(state): State<ServerState>,
    Path((order_id, kind)): Path<(i64, String)>,
) -> AppResult<Json<CancelledJob>> {
    let kind: JobKind = kind
        .parse()
        .map_err(|e: shared::order::ParseJobKindError| {
            AppError::with_message(ErrorCode::InvalidJobKind, e.to_string())
        })?;
    let job_id = state.scheduler.cancel_jobs_for(order_id, kind)?;
    Ok(Json(CancelledJob { job_id }))
}
