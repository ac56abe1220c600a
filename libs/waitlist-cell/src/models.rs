// libs/waitlist-cell/src/models.rs
use std::fmt;

use calendar_cell::SlotId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{PatientId, SchedulingError};

/// What the patient is waiting for: one exact slot, or any slot on a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WaitlistTarget {
    Slot(SlotId),
    Date(NaiveDate),
}

impl WaitlistTarget {
    pub fn date(&self) -> NaiveDate {
        match self {
            WaitlistTarget::Slot(slot) => slot.date(),
            WaitlistTarget::Date(date) => *date,
        }
    }

    /// A freed slot satisfies entries for that exact slot and for its date.
    pub fn matches_slot(&self, slot: &SlotId) -> bool {
        match self {
            WaitlistTarget::Slot(target) => target == slot,
            WaitlistTarget::Date(date) => *date == slot.date(),
        }
    }
}

impl fmt::Display for WaitlistTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitlistTarget::Slot(slot) => write!(f, "slot {}", slot),
            WaitlistTarget::Date(date) => write!(f, "date {}", date),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Promoted,
    Claimed,
    Expired,
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaitlistStatus::Waiting => "waiting",
            WaitlistStatus::Promoted => "promoted",
            WaitlistStatus::Claimed => "claimed",
            WaitlistStatus::Expired => "expired",
        };
        f.write_str(label)
    }
}

impl WaitlistStatus {
    pub fn can_transition_to(&self, next: WaitlistStatus) -> bool {
        matches!(
            (self, next),
            (WaitlistStatus::Waiting, WaitlistStatus::Promoted)
                | (WaitlistStatus::Waiting, WaitlistStatus::Expired)
                | (WaitlistStatus::Promoted, WaitlistStatus::Claimed)
                | (WaitlistStatus::Promoted, WaitlistStatus::Expired)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WaitlistStatus::Claimed | WaitlistStatus::Expired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    HoldLapsed,
    Removed,
    /// Every slot the entry could be promoted into has started.
    SlotPassed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub target: WaitlistTarget,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Insertion order, breaks ties between entries created at the same instant.
    pub sequence: u64,
    pub offered_slot: Option<SlotId>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub expiry_reason: Option<ExpiryReason>,
}

impl WaitlistEntry {
    pub fn new(patient_id: PatientId, target: WaitlistTarget, now: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            target,
            status: WaitlistStatus::Waiting,
            created_at: now,
            updated_at: now,
            sequence,
            offered_slot: None,
            hold_expires_at: None,
            expiry_reason: None,
        }
    }

    /// Promoted and still inside its hold window.
    pub fn is_live_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Promoted && self.hold_expires_at.map_or(false, |t| t > now)
    }

    pub fn is_lapsed_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Promoted && self.hold_expires_at.map_or(true, |t| t <= now)
    }

    pub fn holds_slot(&self, slot: &SlotId, now: DateTime<Utc>) -> bool {
        self.is_live_hold(now) && self.offered_slot.as_ref() == Some(slot)
    }

    /// Waiting, or promoted with the hold still running.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == WaitlistStatus::Waiting || self.is_live_hold(now)
    }

    pub(crate) fn transition(&mut self, next: WaitlistStatus, now: DateTime<Utc>) -> Result<(), SchedulingError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulingError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
