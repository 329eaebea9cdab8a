//! Side HTTP endpoint exposing pipeline and process metrics, runtime
//! introspection and liveness.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::process;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Static facts about the running binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub revision: Option<&'static str>,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            revision: option_env!("GZSHIP_BUILD_REVISION"),
        }
    }
}

#[derive(Clone)]
pub struct MonitorState {
    metrics: PrometheusHandle,
    started_at: Instant,
    build: BuildInfo,
}

impl fmt::Debug for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorState")
            .field("started_at", &self.started_at)
            .field("build", &self.build)
            .finish_non_exhaustive()
    }
}

impl MonitorState {
    pub fn new(metrics: PrometheusHandle) -> Self {
        Self::with_build(metrics, BuildInfo::current())
    }

    pub fn with_build(metrics: PrometheusHandle, build: BuildInfo) -> Self {
        Self {
            metrics,
            started_at: Instant::now(),
            build,
        }
    }
}

/// Install the process-wide Prometheus recorder and register metric help text.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    gzship_core::telemetry::describe();
    Ok(handle)
}

pub fn router(state: MonitorState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/debug/runtime", get(runtime_handler))
        .with_state(Arc::new(state))
}

/// Serve the monitor router until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: MonitorState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(target: "gzship::monitor", %addr, "monitor endpoint listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn metrics_handler(State(state): State<Arc<MonitorState>>) -> impl IntoResponse {
    let mut body = state.metrics.render();
    if let Some(snapshot) = process::sample().await {
        snapshot.render_into(&mut body);
    }
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

/// Tokio scheduler state of the serving runtime.
async fn runtime_handler() -> Json<Value> {
    let metrics = tokio::runtime::Handle::current().metrics();
    Json(json!({
        "workers": metrics.num_workers(),
        "alive_tasks": metrics.num_alive_tasks(),
        "global_queue_depth": metrics.global_queue_depth(),
    }))
}

async fn health_handler(State(state): State<Arc<MonitorState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": state.build.version,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

async fn version_handler(State(state): State<Arc<MonitorState>>) -> Json<Value> {
    Json(json!({
        "name": state.build.name,
        "version": state.build.version,
        "revision": state.build.revision,
    }))
}
