// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::SchedulingError;

use crate::models::AppointmentStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed. Cancelling twice is
    /// reported as `AlreadyCancelled` rather than a generic transition error.
    pub fn validate_status_transition(
        &self,
        appointment_id: Uuid,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == AppointmentStatus::Cancelled && new_status == AppointmentStatus::Cancelled {
            return Err(SchedulingError::AlreadyCancelled(appointment_id));
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(SchedulingError::InvalidStatusTransition {
                from: current_status.to_string(),
                to: new_status.to_string(),
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Confirmed => vec![AppointmentStatus::Cancelled, AppointmentStatus::Completed],
            // Terminal states
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::Completed => vec![],
        }
    }

    /// A confirmed appointment is complete once its slot has ended.
    pub fn should_complete(&self, current_status: AppointmentStatus, slot_end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        current_status == AppointmentStatus::Confirmed && slot_end <= now
    }

    /// Reminder window `[now + lead, now + lead + 1h)`.
    pub fn is_reminder_due(
        &self,
        current_status: AppointmentStatus,
        slot_start: DateTime<Utc>,
        now: DateTime<Utc>,
        lead: Duration,
    ) -> bool {
        let window_start = now + lead;
        current_status == AppointmentStatus::Confirmed
            && slot_start >= window_start
            && slot_start < window_start + Duration::hours(1)
    }
}
