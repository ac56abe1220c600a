// libs/waitlist-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use calendar_cell::SlotId;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::{PatientId, SchedulingError};

use crate::models::{ExpiryReason, WaitlistEntry, WaitlistStatus, WaitlistTarget};

/// Storage for waitlist entries.
///
/// Implementations apply each mutation atomically. Ordering of candidates is
/// FIFO by `created_at`, then by insertion sequence.
#[async_trait]
pub trait Waitlist: Send + Sync + 'static {
    /// Fails with `DuplicateEntry` when the patient already has an open entry
    /// (waiting, or holding a live promotion) for the same target.
    async fn add(
        &self,
        patient_id: PatientId,
        target: WaitlistTarget,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, SchedulingError>;

    async fn get(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError>;

    /// Waiting entries that a freed `slot` would satisfy, oldest first.
    async fn next_candidates(&self, slot: &SlotId) -> Result<Vec<WaitlistEntry>, SchedulingError>;

    async fn mark_promoted(
        &self,
        entry_id: Uuid,
        offered_slot: SlotId,
        hold_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, SchedulingError>;

    async fn mark_claimed(&self, entry_id: Uuid, now: DateTime<Utc>) -> Result<WaitlistEntry, SchedulingError>;

    async fn mark_expired(
        &self,
        entry_id: Uuid,
        reason: ExpiryReason,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, SchedulingError>;

    /// Manual removal. Returns the entry as it was before removal so callers
    /// can tell whether it was holding capacity.
    async fn remove(&self, entry_id: Uuid, now: DateTime<Utc>) -> Result<WaitlistEntry, SchedulingError>;

    async fn list_by_patient(&self, patient_id: &PatientId) -> Result<Vec<WaitlistEntry>, SchedulingError>;

    /// Live promotion holds on `slot`.
    async fn active_holds(&self, slot: &SlotId, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError>;

    /// Promoted entries whose hold has run out, across all slots.
    async fn lapsed_holds(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError>;

    /// Every entry still waiting for promotion, oldest first.
    async fn waiting_entries(&self) -> Result<Vec<WaitlistEntry>, SchedulingError>;
}

#[derive(Default)]
struct WaitlistState {
    entries: HashMap<Uuid, WaitlistEntry>,
    next_sequence: u64,
}

/// Process-local waitlist behind a single `RwLock`.
#[derive(Default)]
pub struct InMemoryWaitlist {
    state: RwLock<WaitlistState>,
}

impl InMemoryWaitlist {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, entry_id: Uuid, apply: F) -> Result<WaitlistEntry, SchedulingError>
    where
        F: FnOnce(&mut WaitlistEntry) -> Result<(), SchedulingError> + Send,
    {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or_else(|| SchedulingError::NotFound(format!("waitlist entry {}", entry_id)))?;

        let mut updated = entry.clone();
        apply(&mut updated)?;
        *entry = updated.clone();
        Ok(updated)
    }
}

fn fifo(entries: &mut [WaitlistEntry]) {
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.sequence.cmp(&b.sequence)));
}

#[async_trait]
impl Waitlist for InMemoryWaitlist {
    async fn add(
        &self,
        patient_id: PatientId,
        target: WaitlistTarget,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, SchedulingError> {
        let mut state = self.state.write().await;

        let duplicate = state.entries.values().any(|e| {
            e.patient_id == patient_id && e.target == target && e.is_open(now)
        });
        if duplicate {
            return Err(SchedulingError::DuplicateEntry(target.to_string()));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let entry = WaitlistEntry::new(patient_id, target, now, sequence);
        state.entries.insert(entry.id, entry.clone());

        info!("Waitlist entry {} added for {} ({})", entry.id, entry.patient_id, entry.target);
        Ok(entry)
    }

    async fn get(&self, entry_id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        let state = self.state.read().await;
        state
            .entries
            .get(&entry_id)
            .cloned()
            .ok_or_else(|| SchedulingError::NotFound(format!("waitlist entry {}", entry_id)))
    }

    async fn next_candidates(&self, slot: &SlotId) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let state = self.state.read().await;
        let mut candidates: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| e.status == WaitlistStatus::Waiting && e.target.matches_slot(slot))
            .cloned()
            .collect();
        fifo(&mut candidates);

        debug!("{} waitlist candidate(s) for slot {}", candidates.len(), slot);
        Ok(candidates)
    }

    async fn mark_promoted(
        &self,
        entry_id: Uuid,
        offered_slot: SlotId,
        hold_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, SchedulingError> {
        self.update(entry_id, |entry| {
            entry.transition(WaitlistStatus::Promoted, now)?;
            entry.offered_slot = Some(offered_slot);
            entry.hold_expires_at = Some(hold_expires_at);
            Ok(())
        })
        .await
    }

    async fn mark_claimed(&self, entry_id: Uuid, now: DateTime<Utc>) -> Result<WaitlistEntry, SchedulingError> {
        self.update(entry_id, |entry| entry.transition(WaitlistStatus::Claimed, now))
            .await
    }

    async fn mark_expired(
        &self,
        entry_id: Uuid,
        reason: ExpiryReason,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, SchedulingError> {
        self.update(entry_id, |entry| {
            entry.transition(WaitlistStatus::Expired, now)?;
            entry.expiry_reason = Some(reason);
            Ok(())
        })
        .await
    }

    async fn remove(&self, entry_id: Uuid, now: DateTime<Utc>) -> Result<WaitlistEntry, SchedulingError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or_else(|| SchedulingError::NotFound(format!("waitlist entry {}", entry_id)))?;

        let before = entry.clone();
        entry.transition(WaitlistStatus::Expired, now)?;
        entry.expiry_reason = Some(ExpiryReason::Removed);

        info!("Waitlist entry {} removed (was {})", entry_id, before.status);
        Ok(before)
    }

    async fn list_by_patient(&self, patient_id: &PatientId) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let state = self.state.read().await;
        let mut entries: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| &e.patient_id == patient_id)
            .cloned()
            .collect();
        fifo(&mut entries);
        Ok(entries)
    }

    async fn active_holds(&self, slot: &SlotId, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let state = self.state.read().await;
        let mut holds: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| e.holds_slot(slot, now))
            .cloned()
            .collect();
        fifo(&mut holds);
        Ok(holds)
    }

    async fn lapsed_holds(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let state = self.state.read().await;
        let mut lapsed: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| e.is_lapsed_hold(now))
            .cloned()
            .collect();
        fifo(&mut lapsed);
        Ok(lapsed)
    }

    async fn waiting_entries(&self) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let state = self.state.read().await;
        let mut waiting: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| e.status == WaitlistStatus::Waiting)
            .cloned()
            .collect();
        fifo(&mut waiting);
        Ok(waiting)
    }
}
