// libs/notification-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::PatientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Reminder,
    WaitlistOffer,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationKind::Confirmation => "confirmation",
            NotificationKind::Reminder => "reminder",
            NotificationKind::WaitlistOffer => "waitlist_offer",
        };
        f.write_str(label)
    }
}

/// Message data. Times are clinic-local wall clock, the way patients read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub slot_start: NaiveDateTime,
    pub appointment_id: Option<Uuid>,
    pub waitlist_entry_id: Option<Uuid>,
    pub hold_until: Option<NaiveDateTime>,
}

impl NotificationPayload {
    pub fn for_appointment(appointment_id: Uuid, slot_start: NaiveDateTime) -> Self {
        Self {
            slot_start,
            appointment_id: Some(appointment_id),
            waitlist_entry_id: None,
            hold_until: None,
        }
    }

    pub fn for_offer(entry_id: Uuid, slot_start: NaiveDateTime, hold_until: NaiveDateTime) -> Self {
        Self {
            slot_start,
            appointment_id: None,
            waitlist_entry_id: Some(entry_id),
            hold_until: Some(hold_until),
        }
    }
}

/// How a message left the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryReceipt {
    Sent { sid: String, to: String },
    DryRun { to: String },
    Mock { to: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered { receipt: DeliveryReceipt },
    Failed { error: String },
    TimedOut,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// One outbound message attempt, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
    pub outcome: DeliveryOutcome,
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryRecord {
    pub fn new(
        patient_id: PatientId,
        kind: NotificationKind,
        payload: NotificationPayload,
        outcome: DeliveryOutcome,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            kind,
            payload,
            outcome,
            attempted_at,
        }
    }
}
