//! Operational HTTP surface: liveness, service info and stream counters.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use chrono::Local;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ProcessorConfig, Topics};
use crate::stats::{ProcessorStats, StatsSnapshot};

const SERVICE_NAME: &str = "signal-processor";
const DESCRIPTION: &str =
    "Matches vehicle positions to nearby stops and publishes schedule status events";

#[derive(Clone)]
pub struct ApiState {
    pub stats: Arc<ProcessorStats>,
    pub config: ProcessorConfig,
    pub topics: Topics,
    pub stop_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub timestamp: String,
    pub consumes: String,
    pub produces: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub topics: Topics,
    pub config: ProcessorConfig,
    pub stop_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StreamStatusResponse {
    pub running: bool,
    pub counters: StatsSnapshot,
    pub emit_percent: f64,
}

/// Liveness plus the consumed and produced topic names.
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        service: SERVICE_NAME,
        status: "UP",
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        consumes: state.topics.consumes,
        produces: state.topics.produces,
    })
}

pub async fn service_info(State(state): State<ApiState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        description: DESCRIPTION,
        topics: state.topics,
        config: state.config,
        stop_count: state.stop_count,
    })
}

pub async fn stream_status(State(state): State<ApiState>) -> Json<StreamStatusResponse> {
    let counters = state.stats.snapshot();
    Json(StreamStatusResponse {
        running: state.stats.is_running(),
        emit_percent: counters.emit_pct(),
        counters,
    })
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/processor/health", get(health))
        .route("/api/processor/info", get(service_info))
        .route("/api/processor/stream-status", get(stream_status))
        .with_state(state)
}

/// Serves [`router`] on `addr` until the task is dropped.
pub async fn serve(addr: SocketAddr, state: ApiState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP surface listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
