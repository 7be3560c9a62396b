//! SkyScan server library
//!
//! Satellite image vessel-detection demo service: image intake with
//! background durable uploads, report generation backed by SQLite, and an
//! SSE stream of user notifications.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use skyscan_common::events::EventBus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::{FsBlobStore, Workspace};

/// Bucket directory exposed under `/storage/<bucket>`
#[derive(Debug, Clone)]
pub struct StorageMount {
    pub bucket: String,
    pub dir: PathBuf,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub workspace: Workspace,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    pub storage: StorageMount,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        blob_store: FsBlobStore,
        upload_timeout: Duration,
    ) -> Self {
        let storage = StorageMount {
            bucket: blob_store.bucket().to_string(),
            dir: blob_store.bucket_dir().to_path_buf(),
        };
        let workspace = Workspace::new(
            db.clone(),
            event_bus.clone(),
            Arc::new(blob_store),
            upload_timeout,
        );

        Self {
            db,
            event_bus,
            workspace,
            startup_time: Utc::now(),
            storage,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let storage_path = format!("/storage/{}", state.storage.bucket);
    let storage = ServeDir::new(&state.storage.dir);

    Router::new()
        .merge(api::report_routes())
        .merge(api::workspace_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .nest_service(&storage_path, storage)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
