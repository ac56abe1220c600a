// =====================================================================================
// MONITORING CELL MODELS
// =====================================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub detail: String,
}

impl HealthCheck {
    pub fn new(component: &str, status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            component: component.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub ok: bool,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// False only when a component is unhealthy; degraded still serves traffic.
    pub ok: bool,
    pub app: String,
    pub env: String,
    pub utc_offset: String,
    pub ts: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<HealthCheck>,
}
