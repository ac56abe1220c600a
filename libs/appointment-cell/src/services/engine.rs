// libs/appointment-cell/src/services/engine.rs
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use calendar_cell::{CalendarError, DateRange, SlotCalendar, SlotId};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::{
    notifier_from_config, DeliveryLog, DeliveryOutcome, DeliveryRecord, InMemoryDeliveryLog, NotificationKind,
    NotificationPayload, Notifier,
};
use shared_config::AppConfig;
use shared_models::{PatientId, SchedulingError};
use shared_utils::{Clock, SystemClock};
use waitlist_cell::{ExpiryReason, InMemoryWaitlist, Waitlist, WaitlistEntry, WaitlistStatus, WaitlistTarget};

use crate::models::{
    Appointment, AppointmentStatus, BookingOutcome, CancelOutcome, HoldSweepSummary, NewAppointment, RescheduleOutcome,
    SlotAvailability, WaitlistOffer,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locks::{SlotGuard, SlotLockRegistry};
use crate::services::retry::RetryPolicy;
use crate::services::store::{AppointmentStore, InMemoryAppointmentStore};

const NOTIFY_TIMEOUT: StdDuration = StdDuration::from_secs(10);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How long a promoted waitlist entry keeps its unit before it lapses.
    pub hold_window: Duration,
    pub one_appointment_per_day: bool,
    pub reminder_lead: Duration,
    pub retry: RetryPolicy,
    pub notify_timeout: StdDuration,
}

impl EngineSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            hold_window: Duration::minutes(config.waitlist_hold_minutes),
            one_appointment_per_day: config.one_appointment_per_day,
            reminder_lead: Duration::hours(config.reminder_lead_hours),
            retry: RetryPolicy::new(
                StdDuration::from_millis(config.storage_timeout_ms),
                config.storage_max_retries,
            ),
            notify_timeout: NOTIFY_TIMEOUT,
        }
    }
}

/// Orchestrates booking, rescheduling, cancellation and waitlist promotion.
///
/// Every operation touching a slot's capacity runs under that slot's lock;
/// operations on two slots take both locks in slot order. Notifications go out
/// after the locks are released and never fail the operation.
pub struct SchedulingEngine {
    pub(crate) calendar: SlotCalendar,
    pub(crate) store: Arc<dyn AppointmentStore>,
    pub(crate) waitlist: Arc<dyn Waitlist>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) deliveries: Arc<dyn DeliveryLog>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: EngineSettings,
    pub(crate) locks: SlotLockRegistry,
    pub(crate) lifecycle: AppointmentLifecycleService,
    /// Appointments that already received their reminder.
    pub(crate) reminded: Mutex<HashSet<Uuid>>,
}

impl SchedulingEngine {
    pub fn new(
        calendar: SlotCalendar,
        store: Arc<dyn AppointmentStore>,
        waitlist: Arc<dyn Waitlist>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            calendar,
            store,
            waitlist,
            notifier,
            deliveries: Arc::new(InMemoryDeliveryLog::new()),
            clock,
            settings,
            locks: SlotLockRegistry::new(),
            lifecycle: AppointmentLifecycleService::new(),
            reminded: Mutex::new(HashSet::new()),
        }
    }

    /// In-memory storage, system clock and the notifier the configuration
    /// asks for.
    pub fn from_config(config: &AppConfig) -> Result<Self, CalendarError> {
        Self::with_collaborators(config, notifier_from_config(config), Arc::new(SystemClock))
    }

    pub fn with_collaborators(
        config: &AppConfig,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CalendarError> {
        let calendar = SlotCalendar::from_app_config(config)?;
        Ok(Self::new(
            calendar,
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(InMemoryWaitlist::new()),
            notifier,
            clock,
            EngineSettings::from_app_config(config),
        ))
    }

    pub fn with_delivery_log(mut self, deliveries: Arc<dyn DeliveryLog>) -> Self {
        self.deliveries = deliveries;
        self
    }

    pub fn delivery_log(&self) -> &dyn DeliveryLog {
        self.deliveries.as_ref()
    }

    pub fn calendar(&self) -> &SlotCalendar {
        &self.calendar
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    /// Slots in `range` that have not started yet, with remaining capacity
    /// net of confirmed bookings and live promotion holds.
    #[instrument(skip(self))]
    pub async fn list_availability(
        &self,
        range: DateRange,
        include_full: bool,
    ) -> Result<Vec<SlotAvailability>, SchedulingError> {
        let now = self.clock.now();
        let from = range.start.and_time(NaiveTime::default());
        let to = (range.end + Duration::days(1)).and_time(NaiveTime::default());

        let store = self.store.as_ref();
        let booked = self
            .settings
            .retry
            .run("list confirmed appointments", move || store.list_confirmed_between(from, to))
            .await?;

        let mut confirmed_by_slot: HashMap<SlotId, u32> = HashMap::new();
        for appointment in &booked {
            *confirmed_by_slot.entry(appointment.slot_id).or_default() += 1;
        }

        let slots: Vec<_> = self
            .calendar
            .list_slots(range, None)
            .filter(|slot| !self.calendar.is_past(&slot.id, now))
            .collect();

        let mut available = Vec::with_capacity(slots.len());
        for slot in slots {
            let confirmed = confirmed_by_slot.get(&slot.id).copied().unwrap_or(0);
            let held = self.active_holds(&slot.id, now).await?.len() as u32;
            let slot = slot.with_occupied(confirmed + held);

            if include_full || !slot.is_full() {
                available.push(SlotAvailability { slot, confirmed, held });
            }
        }

        debug!("{} slot(s) listed between {} and {}", available.len(), range.start, range.end);
        Ok(available)
    }

    // ==========================================================================
    // BOOK / RESCHEDULE / CANCEL
    // ==========================================================================

    /// Books `slot_id` for the patient. A full slot is not an error: the
    /// caller gets `WaitlistOffered` and decides whether to join.
    #[instrument(skip(self, patient_id, slot_id), fields(patient = %patient_id, slot = %slot_id))]
    pub async fn book(&self, patient_id: PatientId, slot_id: SlotId) -> Result<BookingOutcome, SchedulingError> {
        let now = self.clock.now();
        self.validate_future_slot(&slot_id, now)?;

        let guard = self.lock(&[slot_id]).await?;
        let mut offers = Vec::new();
        let result = self.book_locked(&patient_id, slot_id, now, &mut offers).await;
        drop(guard);

        self.send_offers(&offers).await;

        let outcome = result?;
        if let BookingOutcome::Booked { appointment } = &outcome {
            self.send_confirmation(appointment).await;
        }
        Ok(outcome)
    }

    async fn book_locked(
        &self,
        patient_id: &PatientId,
        slot_id: SlotId,
        now: DateTime<Utc>,
        offers: &mut Vec<WaitlistEntry>,
    ) -> Result<BookingOutcome, SchedulingError> {
        self.reoffer_lapsed_locked(&slot_id, now, offers).await?;

        let (capacity, own_hold) = self.effective_capacity(patient_id, &slot_id, now).await?;
        let request = NewAppointment {
            patient_id: patient_id.clone(),
            slot_id,
            capacity,
            one_per_day: self.settings.one_appointment_per_day,
            now,
        };

        let store = self.store.as_ref();
        let created = self
            .settings
            .retry
            .run("create appointment", move || store.create(request.clone()))
            .await;

        match created {
            Ok(appointment) => {
                if let Some(hold) = own_hold {
                    self.claim_hold(hold.id, now).await?;
                    offers.retain(|offer| offer.id != hold.id);
                }
                Ok(BookingOutcome::Booked { appointment })
            }
            Err(SchedulingError::CapacityExceeded { .. }) => {
                info!("Slot {} is full, offering waitlist to {}", slot_id, patient_id);
                Ok(BookingOutcome::WaitlistOffered {
                    offer: WaitlistOffer {
                        slot_id,
                        date: slot_id.date(),
                    },
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Moves an appointment to `new_slot` atomically, then offers the freed
    /// unit of the old slot to the waitlist.
    #[instrument(skip(self, new_slot), fields(slot = %new_slot))]
    pub async fn reschedule(&self, appointment_id: Uuid, new_slot: SlotId) -> Result<RescheduleOutcome, SchedulingError> {
        let now = self.clock.now();
        self.validate_future_slot(&new_slot, now)?;

        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle
            .validate_status_transition(current.id, current.status, AppointmentStatus::Cancelled)?;

        let guard = self.lock(&[current.slot_id, new_slot]).await?;
        let mut offers = Vec::new();
        let result = self.reschedule_locked(&current, new_slot, now, &mut offers).await;
        drop(guard);

        self.send_offers(&offers).await;

        let outcome = result?;
        self.send_confirmation(&outcome.appointment).await;
        Ok(outcome)
    }

    async fn reschedule_locked(
        &self,
        current: &Appointment,
        new_slot: SlotId,
        now: DateTime<Utc>,
        offers: &mut Vec<WaitlistEntry>,
    ) -> Result<RescheduleOutcome, SchedulingError> {
        self.reoffer_lapsed_locked(&new_slot, now, offers).await?;

        let (capacity, own_hold) = self.effective_capacity(&current.patient_id, &new_slot, now).await?;
        let one_per_day = self.settings.one_appointment_per_day;
        let appointment_id = current.id;

        let store = self.store.as_ref();
        let (previous, appointment) = self
            .settings
            .retry
            .run("reschedule appointment", move || {
                store.reschedule(appointment_id, new_slot, capacity, one_per_day, now)
            })
            .await?;

        if let Some(hold) = own_hold {
            self.claim_hold(hold.id, now).await?;
            offers.retain(|offer| offer.id != hold.id);
        }
        self.forget_reminder(&previous.id);

        self.expire_lapsed_locked(&previous.slot_id, now).await?;
        let promoted = self.promote_locked(&previous.slot_id, now).await?;
        offers.extend(promoted.iter().cloned());

        Ok(RescheduleOutcome {
            appointment,
            previous,
            promoted,
        })
    }

    /// Cancels an appointment and promotes waitlisted patients into the freed
    /// capacity. Cancelling twice reports `AlreadyCancelled` and changes nothing.
    #[instrument(skip(self))]
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<CancelOutcome, SchedulingError> {
        let now = self.clock.now();
        let current = self.get_appointment(appointment_id).await?;

        let guard = self.lock(&[current.slot_id]).await?;
        let result = self.cancel_locked(appointment_id, &current.slot_id, now).await;
        drop(guard);

        let outcome = result?;
        self.send_offers(&outcome.promoted).await;
        Ok(outcome)
    }

    async fn cancel_locked(
        &self,
        appointment_id: Uuid,
        slot_id: &SlotId,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, SchedulingError> {
        let store = self.store.as_ref();
        let appointment = self
            .settings
            .retry
            .run("cancel appointment", move || store.cancel(appointment_id, now))
            .await?;
        self.forget_reminder(&appointment_id);

        self.expire_lapsed_locked(slot_id, now).await?;
        let promoted = self.promote_locked(slot_id, now).await?;

        Ok(CancelOutcome { appointment, promoted })
    }

    // ==========================================================================
    // WAITLIST
    // ==========================================================================

    /// Adds the patient to the waitlist. Only targets with no free capacity
    /// are accepted; otherwise the caller gets `SlotAvailable` and should
    /// book directly.
    #[instrument(skip(self, patient_id, target), fields(patient = %patient_id, target = %target))]
    pub async fn waitlist_add(&self, patient_id: PatientId, target: WaitlistTarget) -> Result<WaitlistEntry, SchedulingError> {
        let now = self.clock.now();
        let slots = self.open_slots(&target, now)?;

        let guard = self.lock(&slots).await?;
        let mut offers = Vec::new();
        let result = self
            .waitlist_add_locked(&patient_id, target, &slots, now, &mut offers)
            .await;
        drop(guard);

        self.send_offers(&offers).await;
        result
    }

    async fn waitlist_add_locked(
        &self,
        patient_id: &PatientId,
        target: WaitlistTarget,
        slots: &[SlotId],
        now: DateTime<Utc>,
        offers: &mut Vec<WaitlistEntry>,
    ) -> Result<WaitlistEntry, SchedulingError> {
        if let WaitlistTarget::Slot(slot_id) = target {
            let booked = self.confirmed_in_slot(&slot_id).await?;
            if booked.iter().any(|a| &a.patient_id == patient_id) {
                return Err(SchedulingError::AlreadyBooked(slot_id.to_string()));
            }
        }

        for slot_id in slots {
            self.reoffer_lapsed_locked(slot_id, now, offers).await?;
            if self.free_units(slot_id, now).await? > 0 {
                debug!("Refusing waitlist entry for {}: {} has free capacity", target, slot_id);
                return Err(SchedulingError::SlotAvailable(slot_id.to_string()));
            }
        }

        let waitlist = self.waitlist.as_ref();
        self.settings
            .retry
            .run("add waitlist entry", move || waitlist.add(patient_id.clone(), target, now))
            .await
    }

    /// Manual removal. If the entry was holding a unit, the next candidate is
    /// promoted into it.
    #[instrument(skip(self))]
    pub async fn remove_waitlist_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        let now = self.clock.now();
        let waitlist = self.waitlist.as_ref();

        let before = self
            .settings
            .retry
            .run("remove waitlist entry", move || waitlist.remove(entry_id, now))
            .await?;

        if before.status == WaitlistStatus::Promoted {
            if let Some(slot_id) = before.offered_slot {
                let guard = self.lock(&[slot_id]).await?;
                let promoted = self.promote_locked(&slot_id, now).await;
                drop(guard);
                self.send_offers(&promoted?).await;
            }
        }

        self.settings
            .retry
            .run("get waitlist entry", move || waitlist.get(entry_id))
            .await
    }

    /// Expires every lapsed promotion hold and promotes the next candidate for
    /// each affected slot.
    #[instrument(skip(self))]
    pub async fn expire_holds(&self) -> Result<HoldSweepSummary, SchedulingError> {
        let now = self.clock.now();
        let waitlist = self.waitlist.as_ref();
        let lapsed = self
            .settings
            .retry
            .run("list lapsed holds", move || waitlist.lapsed_holds(now))
            .await?;

        let slots: BTreeSet<SlotId> = lapsed.iter().filter_map(|e| e.offered_slot).collect();
        let mut summary = HoldSweepSummary::default();

        for slot_id in slots {
            let guard = self.lock(&[slot_id]).await?;
            let result = async {
                let expired = self.expire_lapsed_locked(&slot_id, now).await?;
                let promoted = self.promote_locked(&slot_id, now).await?;
                Ok::<_, SchedulingError>((expired, promoted))
            }
            .await;
            drop(guard);

            let (expired, promoted) = result?;
            self.send_offers(&promoted).await;
            summary.expired.extend(expired);
            summary.promoted.extend(promoted);
        }

        let pruned = self.locks.prune();
        if !summary.expired.is_empty() {
            info!(
                "Hold sweep expired {} hold(s), promoted {} entry(ies), pruned {} lock(s)",
                summary.expired.len(),
                summary.promoted.len(),
                pruned
            );
        }
        Ok(summary)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let store = self.store.as_ref();
        self.settings
            .retry
            .run("get appointment", move || store.get(appointment_id))
            .await
    }

    pub async fn list_patient_appointments(&self, patient_id: &PatientId) -> Result<Vec<Appointment>, SchedulingError> {
        let store = self.store.as_ref();
        self.settings
            .retry
            .run("list patient appointments", move || store.list_by_patient(patient_id))
            .await
    }

    pub async fn list_patient_waitlist(&self, patient_id: &PatientId) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let waitlist = self.waitlist.as_ref();
        self.settings
            .retry
            .run("list patient waitlist", move || waitlist.list_by_patient(patient_id))
            .await
    }

    pub async fn get_waitlist_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        let waitlist = self.waitlist.as_ref();
        self.settings
            .retry
            .run("get waitlist entry", move || waitlist.get(entry_id))
            .await
    }

    /// Messages sent, or attempted, to the patient.
    pub async fn list_patient_messages(&self, patient_id: &PatientId) -> Vec<DeliveryRecord> {
        self.deliveries.for_patient(patient_id).await
    }

    // ==========================================================================
    // INTERNALS
    // ==========================================================================

    fn validate_future_slot(&self, slot_id: &SlotId, now: DateTime<Utc>) -> Result<(), SchedulingError> {
        if !self.calendar.is_valid_slot(slot_id) {
            return Err(SchedulingError::InvalidSlot(format!(
                "{} is not on the clinic calendar",
                slot_id
            )));
        }
        if self.calendar.is_past(slot_id, now) {
            return Err(SchedulingError::InvalidSlot(format!("{} has already started", slot_id)));
        }
        Ok(())
    }

    /// Future slots a waitlist target could be promoted into, in slot order.
    fn open_slots(&self, target: &WaitlistTarget, now: DateTime<Utc>) -> Result<Vec<SlotId>, SchedulingError> {
        match *target {
            WaitlistTarget::Slot(slot_id) => {
                self.validate_future_slot(&slot_id, now)?;
                Ok(vec![slot_id])
            }
            WaitlistTarget::Date(date) => {
                if date < self.calendar.local_date(now) {
                    return Err(SchedulingError::InvalidSlot(format!("{} is in the past", date)));
                }
                let slots: Vec<SlotId> = self
                    .calendar
                    .list_slots(DateRange::single(date), None)
                    .map(|slot| slot.id)
                    .filter(|slot_id| !self.calendar.is_past(slot_id, now))
                    .collect();
                if slots.is_empty() {
                    return Err(SchedulingError::InvalidSlot(format!("no bookable slots on {}", date)));
                }
                Ok(slots)
            }
        }
    }

    pub(crate) fn target_is_open(&self, target: &WaitlistTarget, now: DateTime<Utc>) -> bool {
        self.open_slots(target, now).is_ok()
    }

    async fn lock(&self, slots: &[SlotId]) -> Result<SlotGuard, SchedulingError> {
        let locks = &self.locks;
        let wait = self.settings.retry.timeout;
        self.settings
            .retry
            .run("acquire slot lock", move || locks.acquire(slots, wait))
            .await
    }

    async fn active_holds(&self, slot_id: &SlotId, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let waitlist = self.waitlist.as_ref();
        self.settings
            .retry
            .run("list active holds", move || waitlist.active_holds(slot_id, now))
            .await
    }

    async fn confirmed_in_slot(&self, slot_id: &SlotId) -> Result<Vec<Appointment>, SchedulingError> {
        let store = self.store.as_ref();
        let appointments = self
            .settings
            .retry
            .run("list slot appointments", move || store.list_by_slot(slot_id))
            .await?;
        Ok(appointments.into_iter().filter(Appointment::is_confirmed).collect())
    }

    /// Units of the slot neither confirmed nor held.
    async fn free_units(&self, slot_id: &SlotId, now: DateTime<Utc>) -> Result<u32, SchedulingError> {
        let booked = self.confirmed_in_slot(slot_id).await?;
        let holds = self.active_holds(slot_id, now).await?;
        Ok(self
            .calendar
            .capacity()
            .saturating_sub((booked.len() + holds.len()) as u32))
    }

    /// Capacity the store may fill for `patient_id`: the slot capacity minus
    /// live holds owned by other patients. Also returns the patient's own
    /// hold on the slot, if any.
    async fn effective_capacity(
        &self,
        patient_id: &PatientId,
        slot_id: &SlotId,
        now: DateTime<Utc>,
    ) -> Result<(u32, Option<WaitlistEntry>), SchedulingError> {
        let holds = self.active_holds(slot_id, now).await?;
        let (own, others): (Vec<_>, Vec<_>) = holds.into_iter().partition(|h| &h.patient_id == patient_id);
        let capacity = self.calendar.capacity().saturating_sub(others.len() as u32);
        Ok((capacity, own.into_iter().next()))
    }

    async fn claim_hold(&self, entry_id: Uuid, now: DateTime<Utc>) -> Result<(), SchedulingError> {
        let waitlist = self.waitlist.as_ref();
        let claimed = self
            .settings
            .retry
            .run("claim waitlist hold", move || waitlist.mark_claimed(entry_id, now))
            .await?;
        info!("Waitlist entry {} claimed slot {:?}", claimed.id, claimed.offered_slot);
        Ok(())
    }

    /// Expires lapsed holds on one slot. Caller holds the slot lock.
    async fn expire_lapsed_locked(&self, slot_id: &SlotId, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let waitlist = self.waitlist.as_ref();
        let lapsed = self
            .settings
            .retry
            .run("list lapsed holds", move || waitlist.lapsed_holds(now))
            .await?;

        let mut expired = Vec::new();
        for entry in lapsed.into_iter().filter(|e| e.offered_slot.as_ref() == Some(slot_id)) {
            let entry_id = entry.id;
            let entry = self
                .settings
                .retry
                .run("expire waitlist hold", move || {
                    waitlist.mark_expired(entry_id, ExpiryReason::HoldLapsed, now)
                })
                .await?;
            info!("Hold of waitlist entry {} on {} lapsed", entry.id, slot_id);
            expired.push(entry);
        }
        Ok(expired)
    }

    /// Expires lapsed holds on a slot and re-offers exactly the units they
    /// release. Waiting entries never jump ahead of a booker otherwise.
    /// Caller holds the slot lock.
    async fn reoffer_lapsed_locked(
        &self,
        slot_id: &SlotId,
        now: DateTime<Utc>,
        offers: &mut Vec<WaitlistEntry>,
    ) -> Result<(), SchedulingError> {
        let expired = self.expire_lapsed_locked(slot_id, now).await?;
        if !expired.is_empty() {
            offers.extend(self.promote_locked(slot_id, now).await?);
        }
        Ok(())
    }

    /// Promotes waiting candidates, oldest first, one per free unit of the
    /// slot. Caller holds the slot lock.
    async fn promote_locked(&self, slot_id: &SlotId, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        if self.calendar.is_past(slot_id, now) {
            return Ok(Vec::new());
        }

        let booked = self.confirmed_in_slot(slot_id).await?;
        let holds = self.active_holds(slot_id, now).await?;
        let occupied = (booked.len() + holds.len()) as u32;
        let mut remaining = self.calendar.capacity().saturating_sub(occupied);
        if remaining == 0 {
            return Ok(Vec::new());
        }

        let waitlist = self.waitlist.as_ref();
        let candidates = self
            .settings
            .retry
            .run("list waitlist candidates", move || waitlist.next_candidates(slot_id))
            .await?;

        let hold_until = (now + self.settings.hold_window).min(self.calendar.slot_start_utc(slot_id));
        let mut promoted: Vec<WaitlistEntry> = Vec::new();

        for candidate in candidates {
            if remaining == 0 {
                break;
            }

            let already_served = booked.iter().any(|a| a.patient_id == candidate.patient_id)
                || holds.iter().any(|h| h.patient_id == candidate.patient_id)
                || promoted.iter().any(|p| p.patient_id == candidate.patient_id);
            if already_served {
                debug!("Skipping waitlist entry {}: patient already served on {}", candidate.id, slot_id);
                continue;
            }

            let candidate_id = candidate.id;
            let slot = *slot_id;
            let entry = self
                .settings
                .retry
                .run("promote waitlist entry", move || {
                    waitlist.mark_promoted(candidate_id, slot, hold_until, now)
                })
                .await?;

            info!(
                "Waitlist entry {} for {} promoted to {} until {}",
                entry.id, entry.patient_id, slot_id, hold_until
            );
            promoted.push(entry);
            remaining -= 1;
        }

        Ok(promoted)
    }

    pub(crate) async fn notify_best_effort(
        &self,
        patient_id: &PatientId,
        kind: NotificationKind,
        payload: NotificationPayload,
    ) -> bool {
        let outcome = match timeout(self.settings.notify_timeout, self.notifier.notify(patient_id, kind, &payload)).await {
            Ok(Ok(receipt)) => {
                debug!("{} delivered to {}: {:?}", kind, patient_id, receipt);
                DeliveryOutcome::Delivered { receipt }
            }
            Ok(Err(err)) => {
                warn!("Failed to deliver {} to {}: {}", kind, patient_id, err);
                DeliveryOutcome::Failed { error: err.to_string() }
            }
            Err(_) => {
                warn!("Timed out delivering {} to {}", kind, patient_id);
                DeliveryOutcome::TimedOut
            }
        };

        let delivered = outcome.is_delivered();
        let record = DeliveryRecord::new(patient_id.clone(), kind, payload, outcome, self.clock.now());
        self.deliveries.record(record).await;
        delivered
    }

    async fn send_confirmation(&self, appointment: &Appointment) {
        let payload = NotificationPayload::for_appointment(appointment.id, appointment.slot_id.start());
        self.notify_best_effort(&appointment.patient_id, NotificationKind::Confirmation, payload)
            .await;
    }

    async fn send_offers(&self, offers: &[WaitlistEntry]) {
        for entry in offers {
            let (Some(slot_id), Some(hold_until)) = (entry.offered_slot, entry.hold_expires_at) else {
                continue;
            };
            let payload = NotificationPayload::for_offer(
                entry.id,
                slot_id.start(),
                self.calendar.local_now(hold_until),
            );
            self.notify_best_effort(&entry.patient_id, NotificationKind::WaitlistOffer, payload)
                .await;
        }
    }
}
