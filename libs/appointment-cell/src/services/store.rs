// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use calendar_cell::SlotId;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::{PatientId, SchedulingError};

use crate::models::{Appointment, AppointmentStatus, NewAppointment};
use crate::services::lifecycle::AppointmentLifecycleService;

/// Durable record of bookings.
///
/// Every mutating call is atomic: either all of its checks pass and the change
/// is applied, or nothing changes. Implementations report backend trouble as
/// `SchedulingError::TransientStorage` so the engine can retry.
#[async_trait]
pub trait AppointmentStore: Send + Sync + 'static {
    /// Fails with `CapacityExceeded` when the slot already has `capacity`
    /// confirmed appointments, `AlreadyBooked` when the patient is already
    /// confirmed on the slot, and `PatientDayConflict` when `one_per_day` is
    /// set and the patient has another confirmed appointment that day.
    async fn create(&self, request: NewAppointment) -> Result<Appointment, SchedulingError>;

    async fn cancel(&self, appointment_id: Uuid, now: DateTime<Utc>) -> Result<Appointment, SchedulingError>;

    /// Cancels the appointment and books `new_slot` for the same patient in
    /// one step. Returns `(previous, replacement)`. On any failure the
    /// original appointment is left confirmed and untouched.
    async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_slot: SlotId,
        capacity: u32,
        one_per_day: bool,
        now: DateTime<Utc>,
    ) -> Result<(Appointment, Appointment), SchedulingError>;

    async fn complete(&self, appointment_id: Uuid, now: DateTime<Utc>) -> Result<Appointment, SchedulingError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError>;

    async fn list_by_patient(&self, patient_id: &PatientId) -> Result<Vec<Appointment>, SchedulingError>;

    async fn list_by_slot(&self, slot_id: &SlotId) -> Result<Vec<Appointment>, SchedulingError>;

    /// Confirmed appointments whose slot starts in `[from, to)`, local time.
    async fn list_confirmed_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, SchedulingError>;
}

#[derive(Default)]
struct StoreState {
    appointments: HashMap<Uuid, Appointment>,
}

impl StoreState {
    fn confirmed_in_slot(&self, slot_id: &SlotId) -> impl Iterator<Item = &Appointment> + '_ {
        let slot_id = *slot_id;
        self.appointments
            .values()
            .filter(move |a| a.is_confirmed() && a.slot_id == slot_id)
    }

    /// Shared admission checks for create and reschedule. `moving` is the
    /// appointment being replaced, which never conflicts with itself.
    fn check_admission(
        &self,
        patient_id: &PatientId,
        slot_id: &SlotId,
        capacity: u32,
        one_per_day: bool,
        moving: Option<Uuid>,
    ) -> Result<(), SchedulingError> {
        let mut confirmed = 0u32;
        for appointment in self.confirmed_in_slot(slot_id) {
            if &appointment.patient_id == patient_id {
                return Err(SchedulingError::AlreadyBooked(slot_id.to_string()));
            }
            confirmed += 1;
        }

        if one_per_day {
            let date = slot_id.date();
            let conflict = self.appointments.values().any(|a| {
                a.is_confirmed() && &a.patient_id == patient_id && a.date() == date && Some(a.id) != moving
            });
            if conflict {
                return Err(SchedulingError::PatientDayConflict(date));
            }
        }

        if confirmed >= capacity {
            return Err(SchedulingError::CapacityExceeded {
                slot_id: slot_id.to_string(),
            });
        }

        Ok(())
    }
}

/// Process-local store behind a single `RwLock`; each mutation runs inside one
/// write critical section.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    state: RwLock<StoreState>,
    lifecycle: AppointmentLifecycleService,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        next: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let mut state = self.state.write().await;
        let appointment = state
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| not_found(appointment_id))?;

        self.lifecycle
            .validate_status_transition(appointment_id, appointment.status, next)?;

        appointment.status = next;
        appointment.updated_at = now;
        Ok(appointment.clone())
    }
}

fn not_found(appointment_id: Uuid) -> SchedulingError {
    SchedulingError::NotFound(format!("appointment {}", appointment_id))
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by(|a, b| a.slot_id.cmp(&b.slot_id).then(a.created_at.cmp(&b.created_at)));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create(&self, request: NewAppointment) -> Result<Appointment, SchedulingError> {
        let mut state = self.state.write().await;
        state.check_admission(
            &request.patient_id,
            &request.slot_id,
            request.capacity,
            request.one_per_day,
            None,
        )?;

        let appointment = Appointment::new(request.patient_id, request.slot_id, request.now);
        state.appointments.insert(appointment.id, appointment.clone());

        info!(
            "Appointment {} confirmed for {} at {}",
            appointment.id, appointment.patient_id, appointment.slot_id
        );
        Ok(appointment)
    }

    async fn cancel(&self, appointment_id: Uuid, now: DateTime<Utc>) -> Result<Appointment, SchedulingError> {
        let cancelled = self.transition(appointment_id, AppointmentStatus::Cancelled, now).await?;
        info!("Appointment {} cancelled ({})", cancelled.id, cancelled.slot_id);
        Ok(cancelled)
    }

    async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_slot: SlotId,
        capacity: u32,
        one_per_day: bool,
        now: DateTime<Utc>,
    ) -> Result<(Appointment, Appointment), SchedulingError> {
        let mut state = self.state.write().await;

        let current = state
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| not_found(appointment_id))?;

        self.lifecycle
            .validate_status_transition(appointment_id, current.status, AppointmentStatus::Cancelled)?;

        if current.slot_id == new_slot {
            return Err(SchedulingError::AlreadyBooked(new_slot.to_string()));
        }

        state.check_admission(&current.patient_id, &new_slot, capacity, one_per_day, Some(appointment_id))?;

        // All checks passed; apply both halves together.
        let mut previous = current;
        previous.status = AppointmentStatus::Cancelled;
        previous.updated_at = now;

        let mut replacement = Appointment::new(previous.patient_id.clone(), new_slot, now);
        replacement.rescheduled_from = Some(previous.id);

        state.appointments.insert(previous.id, previous.clone());
        state.appointments.insert(replacement.id, replacement.clone());

        info!(
            "Appointment {} moved from {} to {} as {}",
            previous.id, previous.slot_id, replacement.slot_id, replacement.id
        );
        Ok((previous, replacement))
    }

    async fn complete(&self, appointment_id: Uuid, now: DateTime<Utc>) -> Result<Appointment, SchedulingError> {
        let completed = self.transition(appointment_id, AppointmentStatus::Completed, now).await?;
        debug!("Appointment {} completed", completed.id);
        Ok(completed)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let state = self.state.read().await;
        state
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| not_found(appointment_id))
    }

    async fn list_by_patient(&self, patient_id: &PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .appointments
                .values()
                .filter(|a| &a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_slot(&self, slot_id: &SlotId) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .appointments
                .values()
                .filter(|a| &a.slot_id == slot_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_confirmed_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .appointments
                .values()
                .filter(|a| a.is_confirmed() && a.slot_id.start() >= from && a.slot_id.start() < to)
                .cloned()
                .collect(),
        ))
    }
}
