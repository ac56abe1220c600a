// libs/appointment-cell/src/models.rs
use std::fmt;

use calendar_cell::{Slot, SlotId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::PatientId;
use waitlist_cell::WaitlistEntry;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub slot_id: SlotId,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rescheduled_from: Option<Uuid>,
}

impl Appointment {
    pub fn new(patient_id: PatientId, slot_id: SlotId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            slot_id,
            status: AppointmentStatus::Confirmed,
            created_at: now,
            updated_at: now,
            rescheduled_from: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == AppointmentStatus::Confirmed
    }

    pub fn date(&self) -> NaiveDate {
        self.slot_id.date()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Insert request handed to the store. `capacity` is already reduced by
/// promotion holds that belong to other patients.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: PatientId,
    pub slot_id: SlotId,
    pub capacity: u32,
    pub one_per_day: bool,
    pub now: DateTime<Utc>,
}

// ==============================================================================
// ENGINE OUTCOMES
// ==============================================================================

/// Returned instead of an error when the slot is full, so the caller can
/// offer the waitlist. The patient is not enrolled automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistOffer {
    pub slot_id: SlotId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Booked { appointment: Appointment },
    WaitlistOffered { offer: WaitlistOffer },
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleOutcome {
    pub appointment: Appointment,
    pub previous: Appointment,
    pub promoted: Vec<WaitlistEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub appointment: Appointment,
    pub promoted: Vec<WaitlistEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HoldSweepSummary {
    pub expired: Vec<WaitlistEntry>,
    pub promoted: Vec<WaitlistEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    #[serde(flatten)]
    pub slot: Slot,
    pub confirmed: u32,
    pub held: u32,
}

// ==============================================================================
// REQUEST / QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: String,
    pub slot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_slot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinWaitlistRequest {
    pub patient_id: String,
    pub slot_id: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub include_full: bool,
}
