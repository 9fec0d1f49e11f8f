//! HTTP status API for the sync service.
//!
//! Provides endpoints for:
//! - Liveness
//! - Per-source freshness and the last sync pass
//! - Per-file replication cursors

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use station_common::DataSource;
use station_sync::{ProgressStore, SourceStatus, StalenessMonitor, SyncProgress};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::runner::RunSummary;

pub struct ServerState {
    pub monitor: Arc<Mutex<StalenessMonitor>>,
    pub last_run: Arc<RwLock<Option<RunSummary>>>,
    pub progress_path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub sources: BTreeMap<DataSource, SourceStatus>,
    pub last_run: Option<RunSummary>,
}

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/progress", get(progress_handler))
        .layer(cors)
        .layer(Extension(state))
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /status - freshness per source and the last pass
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let sources = state.monitor.lock().await.get_status();
    let last_run = state.last_run.read().await.clone();
    Json(StatusResponse {
        service: "station-sync".to_string(),
        sources,
        last_run,
    })
}

/// GET /progress - replication cursor per file, as persisted
async fn progress_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let store = ProgressStore::open(&state.progress_path);
    let progress: BTreeMap<String, SyncProgress> = store.get_all_progress().clone();
    Json(progress)
}

pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting sync status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
