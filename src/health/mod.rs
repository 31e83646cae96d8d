//! Health check endpoints
//!
//! `/health` for liveness, `/ready` for readiness with a per-shard
//! breakdown, `/metrics` for Prometheus scraping.

use crate::metrics::{self, GatewayMetrics};
use crate::nats::NatsPublisher;
use crate::shard::{ShardState, ShardSummary};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub pool_id: u32,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub pool_id: u32,
    pub shards_total: usize,
    pub shards_ready: usize,
    pub nats_connected: bool,
    pub guilds_total: u64,
    pub events_received: u64,
    pub shards: Vec<ShardSummary>,
}

/// Application state for health endpoints
#[derive(Clone)]
pub struct AppState {
    pub shard_state: ShardState,
    pub nats: Option<Arc<NatsPublisher>>,
    /// Absent when no recorder was installed; `/metrics` then returns 503
    pub metrics: Option<GatewayMetrics>,
}

/// Create the health check router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        pool_id: state.shard_state.pool_id(),
    })
}

fn readiness(state: &AppState) -> ReadyResponse {
    let shards_ready = state.shard_state.ready_shards();
    let nats_connected = state.nats.as_ref().map_or(true, |n| n.is_connected());

    ReadyResponse {
        ready: shards_ready > 0 && nats_connected,
        pool_id: state.shard_state.pool_id(),
        shards_total: state.shard_state.shard_count(),
        shards_ready,
        nats_connected,
        guilds_total: state.shard_state.total_guilds(),
        events_received: state.shard_state.total_events_received(),
        shards: state.shard_state.summaries(),
    }
}

/// Readiness endpoint - returns 200 if at least one shard is ready
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = readiness(&state);
    let status = if response.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(ref recorder) = state.metrics else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics recorder not installed\n".to_string(),
        );
    };

    metrics::set_shards_ready(state.shard_state.pool_id(), state.shard_state.ready_shards());
    if let Some(ref nats) = state.nats {
        metrics::set_nats_connected(nats.is_connected());
    }

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        recorder.render(),
    )
}
