//! Health check for monitoring.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

use woosync_sync::QueueName;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    /// Jobs waiting per queue.
    pub pending_jobs: BTreeMap<String, usize>,
    pub version: &'static str,
}

/// `GET /health`. 503 when the database is unreachable.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.ctx.db.health_check().await;

    let pending_jobs = QueueName::ALL
        .iter()
        .map(|queue| (queue.to_string(), state.ctx.queue.pending(*queue)))
        .collect();

    let (code, status) = if database {
        (StatusCode::OK, "serving")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_serving")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            pending_jobs,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
