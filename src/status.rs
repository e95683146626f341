//! Shared scaling status and the read-only HTTP reporter.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The last successful size observation
#[derive(Debug, Clone, Copy, Default)]
pub struct Observation {
    pub last_instance_size: Option<i64>,
    pub last_check: Option<DateTime<Utc>>,
}

/// Store for the latest observation.
///
/// Written by the app client's read path, read by the status endpoint. The
/// two run on different tasks, so the cell sits behind an `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct ScalingStatus {
    inner: Arc<RwLock<Observation>>,
}

impl ScalingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh size observation.
    pub async fn record(&self, size: i64) {
        let mut observation = self.inner.write().await;
        observation.last_instance_size = Some(size);
        observation.last_check = Some(Utc::now());
    }

    pub async fn snapshot(&self) -> Observation {
        *self.inner.read().await
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Instance count seen on the last successful read, `null` before that
    pub last_instance_size: Option<i64>,

    /// RFC 3339 timestamp of that read, `null` before the first one
    pub last_check: Option<String>,
}

/// GET /
async fn get_status(State(status): State<ScalingStatus>) -> Json<StatusResponse> {
    let observation = status.snapshot().await;

    Json(StatusResponse {
        last_instance_size: observation.last_instance_size,
        last_check: observation.last_check.map(|check| check.to_rfc3339()),
    })
}

/// Spawn the status reporter.
///
/// This starts the HTTP server in a background task and returns the bound
/// address. The server runs for the lifetime of the process; there is no
/// shutdown path.
pub async fn spawn_status_server(port: u16, state: ScalingStatus) -> anyhow::Result<SocketAddr> {
    let app = Router::new()
        .route("/", get(get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let addr = listener.local_addr()?;

    info!("status reporter listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("status reporter error: {e}");
        }
    });

    Ok(addr)
}
