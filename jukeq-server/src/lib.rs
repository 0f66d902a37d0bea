//! jukeq-server library - restaurant music-request queue service
//!
//! Owns the per-restaurant playback request queue: diners submit song
//! requests, staff reorder and play them. The queue store enforces the
//! ordinal density and single-playing invariants; this crate also exposes
//! the HTTP surface over it.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod queue;

pub use queue::{QueueFilter, QueueStore};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Queue store over the shared database pool
    pub store: Arc<QueueStore>,
}

impl AppState {
    /// Create new application state
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: Arc::new(QueueStore::new(pool)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, patch, post};

    Router::new()
        .route(
            "/api/restaurants/:restaurant_id/queue",
            get(api::list_queue),
        )
        .route(
            "/api/restaurants/:restaurant_id/queue/stats",
            get(api::queue_stats),
        )
        .route(
            "/api/restaurants/:restaurant_id/requests",
            post(api::create_request),
        )
        .route("/api/requests/:request_id/status", patch(api::update_status))
        .route("/api/requests/:request_id/promote", post(api::promote_request))
        .route("/api/requests/:request_id", delete(api::cancel_request))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
