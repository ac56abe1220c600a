// =====================================================================================
// MONITORING CELL ROUTER
// =====================================================================================

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::{admin_health, admin_ping};
use crate::services::HealthMonitorService;
use shared_config::AppConfig;
use shared_utils::{Clock, SystemClock};

pub fn monitoring_routes(config: Arc<AppConfig>) -> Router {
    monitoring_routes_with_clock(config, Arc::new(SystemClock))
}

pub fn monitoring_routes_with_clock(config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Router {
    let service = Arc::new(HealthMonitorService::new(config, clock));

    Router::new()
        .route("/admin/ping", get(admin_ping))
        .route("/admin/health", get(admin_health))
        .with_state(service)
}
