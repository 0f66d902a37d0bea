//! Request-queue endpoints
//!
//! Implements the REST surface over the queue store: list, create, status
//! update, promote, cancel, stats.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use jukeq_common::db::models::{QueueItem, QueueStats, Request, RequestStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{error_response, ErrorBody};
use crate::queue::QueueFilter;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorBody>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub requests: Vec<QueueItem>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub user_id: String,
    pub song_id: Uuid,
    pub user_table: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/restaurants/:restaurant_id/queue
pub async fn list_queue(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(RequestStatus::parse)
        .transpose()
        .map_err(error_response)?;

    let filter = QueueFilter {
        user_id: params.user_id,
        status,
        limit: params.limit,
        offset: params.offset,
    };

    let (requests, total) = state
        .store
        .list_queue(restaurant_id, &filter)
        .await
        .map_err(error_response)?;

    Ok(Json(ListResponse { requests, total }))
}

/// POST /api/restaurants/:restaurant_id/requests
pub async fn create_request(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    if body.user_id.trim().is_empty() {
        return Err(error_response(jukeq_common::Error::InvalidInput(
            "user_id must not be empty".to_string(),
        )));
    }

    let request = state
        .store
        .enqueue(
            restaurant_id,
            &body.user_id,
            body.song_id,
            body.user_table.as_deref(),
        )
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// PATCH /api/requests/:request_id/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<AffectedResponse>, ApiError> {
    let target = RequestStatus::parse(&body.status).map_err(error_response)?;

    let affected = state
        .store
        .transition_status(request_id, target)
        .await
        .map_err(error_response)?;

    Ok(Json(AffectedResponse { affected }))
}

/// POST /api/requests/:request_id/promote
pub async fn promote_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<AffectedResponse>, ApiError> {
    let affected = state
        .store
        .promote_to_top(request_id)
        .await
        .map_err(error_response)?;

    Ok(Json(AffectedResponse { affected }))
}

/// DELETE /api/requests/:request_id
pub async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<AffectedResponse>, ApiError> {
    let affected = state
        .store
        .cancel(request_id)
        .await
        .map_err(error_response)?;

    Ok(Json(AffectedResponse { affected }))
}

/// GET /api/restaurants/:restaurant_id/queue/stats
pub async fn queue_stats(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Json<QueueStats>, ApiError> {
    let stats = state
        .store
        .stats(restaurant_id)
        .await
        .map_err(error_response)?;

    Ok(Json(stats))
}
