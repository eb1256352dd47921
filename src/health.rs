/// Process health endpoint.
///
/// A single `GET /health` route reporting process uptime and gateway
/// connection state, for container platforms that require a bound port.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Clone)]
pub struct HealthState {
    started_at: Instant,
    connected: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flip the gateway connection flag; called from the ready handler.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    bot: &'static str,
    uptime_seconds: u64,
    timestamp: DateTime<Utc>,
}

async fn get_health(State(state): State<HealthState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        bot: if state.connected.load(Ordering::Acquire) {
            "connected"
        } else {
            "connecting"
        },
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}

/// Bind and serve the health endpoint until the process exits.
pub async fn serve(port: u16, state: HealthState) -> Result<()> {
    let app = Router::new()
        .route("/health", get(get_health))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind health endpoint on port {port}"))?;
    info!(port, "health endpoint listening");

    axum::serve(listener, app)
        .await
        .context("Health endpoint server failed")
}
