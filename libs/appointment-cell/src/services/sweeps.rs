// libs/appointment-cell/src/services/sweeps.rs
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use notification_cell::{NotificationKind, NotificationPayload};
use shared_models::SchedulingError;
use uuid::Uuid;
use waitlist_cell::ExpiryReason;

use crate::services::engine::SchedulingEngine;

/// Result of one pass of the periodic maintenance task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub holds_expired: usize,
    pub entries_promoted: usize,
    pub waiting_expired: usize,
    pub reminders_sent: usize,
    pub appointments_completed: usize,
}

impl SchedulingEngine {
    /// Sends the day-before reminder to confirmed appointments starting in
    /// `[now + lead, now + lead + 1h)`. Each appointment is reminded once; a
    /// failed delivery is retried on the next sweep while still in the window.
    #[instrument(skip(self))]
    pub async fn send_reminders(&self) -> Result<usize, SchedulingError> {
        let now = self.clock.now();
        let lead = self.settings.reminder_lead;
        let from = self.calendar.local_now(now + lead);
        let to = from + Duration::hours(1);

        let store = self.store.as_ref();
        let candidates = self
            .settings
            .retry
            .run("list reminder candidates", move || store.list_confirmed_between(from, to))
            .await?;

        let mut sent = 0;
        for appointment in candidates {
            let slot_start = self.calendar.slot_start_utc(&appointment.slot_id);
            if !self.lifecycle.is_reminder_due(appointment.status, slot_start, now, lead) {
                continue;
            }
            if self.was_reminded(&appointment.id) {
                continue;
            }

            let payload = NotificationPayload::for_appointment(appointment.id, appointment.slot_id.start());
            if self
                .notify_best_effort(&appointment.patient_id, NotificationKind::Reminder, payload)
                .await
            {
                if let Ok(mut reminded) = self.reminded.lock() {
                    reminded.insert(appointment.id);
                }
                sent += 1;
            }
        }

        if sent > 0 {
            info!("Sent {} reminder(s) for slots starting {} to {}", sent, from, to);
        }
        Ok(sent)
    }

    /// Marks confirmed appointments whose slot has ended as completed.
    #[instrument(skip(self))]
    pub async fn complete_elapsed(&self) -> Result<usize, SchedulingError> {
        let now = self.clock.now();
        let local_now = self.calendar.local_now(now);

        let store = self.store.as_ref();
        let candidates = self
            .settings
            .retry
            .run("list elapsed appointments", move || {
                store.list_confirmed_between(NaiveDateTime::MIN, local_now)
            })
            .await?;

        let mut completed = 0;
        for appointment in candidates {
            let slot_end = self.calendar.slot_end_utc(&appointment.slot_id);
            if !self.lifecycle.should_complete(appointment.status, slot_end, now) {
                continue;
            }

            let appointment_id = appointment.id;
            match self
                .settings
                .retry
                .run("complete appointment", move || store.complete(appointment_id, now))
                .await
            {
                Ok(_) => {
                    self.forget_reminder(&appointment_id);
                    completed += 1;
                }
                // Cancelled between the listing and now.
                Err(err) if !err.is_transient() => {
                    debug!("Skipping completion of {}: {}", appointment_id, err);
                }
                Err(err) => return Err(err),
            }
        }

        if completed > 0 {
            info!("Completed {} elapsed appointment(s)", completed);
        }
        Ok(completed)
    }

    /// Expires waiting entries that can no longer be served because their
    /// slot, or every slot of their date, has started.
    #[instrument(skip(self))]
    pub async fn expire_stale_waiting(&self) -> Result<usize, SchedulingError> {
        let now = self.clock.now();
        let waitlist = self.waitlist.as_ref();
        let waiting = self
            .settings
            .retry
            .run("list waiting entries", move || waitlist.waiting_entries())
            .await?;

        let mut expired = 0;
        for entry in waiting.into_iter().filter(|e| !self.target_is_open(&e.target, now)) {
            let entry_id = entry.id;
            match self
                .settings
                .retry
                .run("expire stale waitlist entry", move || {
                    waitlist.mark_expired(entry_id, ExpiryReason::SlotPassed, now)
                })
                .await
            {
                Ok(_) => expired += 1,
                // Promoted or removed since the listing.
                Err(err) if !err.is_transient() => {
                    debug!("Skipping expiry of waitlist entry {}: {}", entry_id, err);
                }
                Err(err) => return Err(err),
            }
        }

        if expired > 0 {
            info!("Expired {} waitlist entry(ies) whose target has passed", expired);
        }
        Ok(expired)
    }

    /// One maintenance pass: hold expiry, stale waitlist entries, reminders,
    /// completion. A failing step is logged and does not stop the others.
    pub async fn run_sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.expire_holds().await {
            Ok(summary) => {
                report.holds_expired = summary.expired.len();
                report.entries_promoted = summary.promoted.len();
            }
            Err(err) => error!("Hold expiry sweep failed: {}", err),
        }

        match self.expire_stale_waiting().await {
            Ok(count) => report.waiting_expired = count,
            Err(err) => error!("Waitlist expiry sweep failed: {}", err),
        }

        match self.send_reminders().await {
            Ok(sent) => report.reminders_sent = sent,
            Err(err) => error!("Reminder sweep failed: {}", err),
        }

        match self.complete_elapsed().await {
            Ok(count) => report.appointments_completed = count,
            Err(err) => error!("Completion sweep failed: {}", err),
        }

        report
    }

    pub fn was_reminded(&self, appointment_id: &Uuid) -> bool {
        self.reminded
            .lock()
            .map(|reminded| reminded.contains(appointment_id))
            .unwrap_or(false)
    }

    /// Drops the reminder marker of an appointment that left `confirmed`.
    pub(crate) fn forget_reminder(&self, appointment_id: &Uuid) {
        if let Ok(mut reminded) = self.reminded.lock() {
            reminded.remove(appointment_id);
        }
    }
}
