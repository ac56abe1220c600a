// =====================================================================================
// MONITORING CELL HANDLERS
// =====================================================================================

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::instrument;

use crate::models::{HealthResponse, PingResponse};
use crate::services::HealthMonitorService;

pub async fn admin_ping(State(service): State<Arc<HealthMonitorService>>) -> Json<PingResponse> {
    Json(service.ping())
}

/// 200 while every component can serve traffic, 503 otherwise.
#[instrument(skip(service))]
pub async fn admin_health(
    State(service): State<Arc<HealthMonitorService>>,
) -> (StatusCode, Json<HealthResponse>) {
    let health = service.health();
    let status = if health.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
