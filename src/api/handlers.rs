//! API Handlers
//!
//! HTTP request handlers for each cache node endpoint. Payloads travel as raw
//! bytes; only metadata responses are JSON.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::debug;

use crate::error::ApiError;
use crate::models::{DeleteResponse, HealthResponse, SetParams, SetResponse, StatsResponse};
use crate::remote::{MemoryRemote, RemoteStore};

/// Application state shared across all handlers.
#[derive(Clone, Default)]
pub struct AppState {
    /// Backing store served by the node
    pub store: Arc<MemoryRemote>,
}

impl AppState {
    /// Creates a new AppState around an existing store.
    pub fn new(store: Arc<MemoryRemote>) -> Self {
        Self { store }
    }
}

/// Handler for PUT /keys/:key
///
/// Stores the raw request body under `key`. `ttl_ms` and `condition` come
/// from the query string.
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<SetParams>,
    body: Bytes,
) -> Result<Json<SetResponse>, ApiError> {
    if let Some(error_msg) = params.validate(&key, body.len()) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let stored = state
        .store
        .set(&key, body, params.ttl(), params.condition)
        .await?;
    debug!(key = %key, stored, condition = params.condition.as_str(), "PUT");

    Ok(Json(SetResponse::new(key, stored)))
}

/// Handler for GET /keys/:key
///
/// Returns the stored payload as `application/octet-stream`.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(key))?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], payload))
}

/// Handler for HEAD /keys/:key
pub async fn head_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.exists(&key).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Handler for DELETE /keys/:key
///
/// Idempotent; deleting an absent key reports `deleted: false`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.store.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.store.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
