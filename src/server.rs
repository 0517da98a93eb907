//! ==============================================================================
//! server.rs - http surface of the relay
//! ==============================================================================
//!
//! routes:
//!     POST /data        ingest a node (default) or kind:"mobile" reading
//!     GET  /data        full history snapshot, oldest first
//!     GET  /api/hello   liveness check
//!     GET  /api/risk    risk assessment over the last ?window=N readings
//!     GET  /ws          live channel (live.rs)
//!     *                 bundled dashboard, falling back to index.html
//!
//! cors is open to all origins.
//!
//! ==============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::domain::Reading;
use crate::error::ValidationError;
use crate::ingest;
use crate::live;
use crate::relay::Relay;
use crate::risk::{self, AirQualityBand, RiskAssessment, RiskPolicy, WindowSummary};

#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub risk: Arc<RiskPolicy>,
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let dashboard = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/data", get(history_handler).post(ingest_handler))
        .route("/api/hello", get(hello_handler))
        .route("/api/risk", get(risk_handler))
        .route("/ws", get(live::ws_handler))
        .fallback_service(dashboard)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: &RelayConfig, relay: Relay) -> Result<()> {
    let state = AppState { relay, risk: Arc::new(config.risk.clone()) };
    let app = router(state, &config.server.static_dir);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.server.bind, config.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// POST /data
///
/// the body is parsed regardless of content-type; sensor firmware often omits it
async fn ingest_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ValidationError> {
    let raw: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "rejected unparseable body");
        ValidationError::MalformedJson(e.to_string())
    })?;
    let kind = ingest::schema_of(&raw)?;
    state.relay.ingest(&raw, kind).await?;
    Ok(Json(json!({ "status": "OK" })))
}

/// GET /data
async fn history_handler(State(state): State<AppState>) -> Json<Vec<Reading>> {
    Json(state.relay.snapshot().await)
}

/// GET /api/hello
async fn hello_handler() -> Json<Value> {
    Json(json!({ "message": "Hello from the relay!" }))
}

#[derive(Deserialize)]
struct RiskParams {
    window: Option<usize>,
}

#[derive(Serialize)]
struct BandInfo {
    band: AirQualityBand,
    label: &'static str,
    color: &'static str,
}

#[derive(Serialize)]
struct RiskReport {
    assessment: RiskAssessment,
    summary: WindowSummary,
    latest: Option<Reading>,
    band: Option<BandInfo>,
}

/// GET /api/risk?window=N
async fn risk_handler(State(state): State<AppState>, Query(params): Query<RiskParams>) -> Json<RiskReport> {
    let window = match params.window {
        Some(n) => state.relay.recent(n).await,
        None => state.relay.snapshot().await,
    };
    let latest = window.last().cloned();
    let band = latest.as_ref().map(|r| {
        let band = AirQualityBand::classify(r.pm25);
        BandInfo { band, label: band.label(), color: band.color() }
    });

    Json(RiskReport {
        assessment: risk::assess(&window, &state.risk),
        summary: WindowSummary::of(&window),
        latest,
        band,
    })
}

/// serve `relay` on an ephemeral loopback port
#[cfg(test)]
pub(crate) async fn spawn_local(relay: Relay) -> SocketAddr {
    let state = AppState { relay, risk: Arc::new(RiskPolicy::default()) };
    let app = router(state, Path::new("no-such-dashboard-dir"));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("loopback addr");
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}
