// =====================================================================================
// MONITORING CELL - ADMIN PING & HEALTH
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{HealthCheck, HealthResponse, HealthStatus, PingResponse};
pub use router::{monitoring_routes, monitoring_routes_with_clock};
pub use services::HealthMonitorService;
