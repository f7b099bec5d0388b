//! Liveness check

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Health check body
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always `"ok"`
    pub status: &'static str,
    /// Server time, RFC 3339
    pub timestamp: String,
}

/// Handler for `GET /api/v1/health` and `GET /health`
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
