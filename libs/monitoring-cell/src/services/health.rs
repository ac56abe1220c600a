// =====================================================================================
// HEALTH MONITORING SERVICE
// =====================================================================================

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::models::{HealthCheck, HealthResponse, HealthStatus, PingResponse};
use shared_config::AppConfig;
use shared_utils::Clock;

pub struct HealthMonitorService {
    start_time: Instant,
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
}

impl HealthMonitorService {
    pub fn new(config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            start_time: Instant::now(),
            config,
            clock,
        }
    }

    pub fn ping(&self) -> PingResponse {
        PingResponse {
            ok: true,
            ts: self.clock.now(),
        }
    }

    #[instrument(skip(self))]
    pub fn health(&self) -> HealthResponse {
        let components = vec![self.check_schedule(), self.check_whatsapp()];
        let ok = components.iter().all(|c| c.status != HealthStatus::Unhealthy);

        if !ok {
            warn!("Health check reports unhealthy components: {:?}", components);
        } else {
            debug!("Health check passed");
        }

        HealthResponse {
            ok,
            app: self.config.app_name.clone(),
            env: self.config.app_env.clone(),
            utc_offset: self.config.clinic_offset().to_string(),
            ts: self.clock.now(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
        }
    }

    fn check_schedule(&self) -> HealthCheck {
        if self.config.is_schedule_valid() {
            HealthCheck::new(
                "schedule",
                HealthStatus::Healthy,
                format!(
                    "{:02}:00-{:02}:00, {} min slots, capacity {}",
                    self.config.clinic_open_hour,
                    self.config.clinic_close_hour,
                    self.config.slot_minutes,
                    self.config.slot_capacity
                ),
            )
        } else {
            HealthCheck::new("schedule", HealthStatus::Unhealthy, "clinic schedule is invalid")
        }
    }

    fn check_whatsapp(&self) -> HealthCheck {
        if self.config.dry_run {
            HealthCheck::new("whatsapp", HealthStatus::Degraded, "dry run, messages are only logged")
        } else if self.config.is_whatsapp_configured() {
            HealthCheck::new("whatsapp", HealthStatus::Healthy, "twilio")
        } else {
            HealthCheck::new("whatsapp", HealthStatus::Degraded, "credentials missing, using mock sender")
        }
    }
}
