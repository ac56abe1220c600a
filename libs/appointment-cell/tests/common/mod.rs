#![allow(dead_code)]

use std::sync::Arc;

use calendar_cell::SlotId;
use chrono::{TimeZone, Utc};

use appointment_cell::{BookingOutcome, SchedulingEngine};
use appointment_cell::models::Appointment;
use notification_cell::RecordingNotifier;
use shared_models::PatientId;
use shared_utils::test_utils::{MockClock, TestConfig};

pub struct Harness {
    pub engine: Arc<SchedulingEngine>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: MockClock,
}

/// Engine over in-memory storage with the clock parked at 2024-02-28 12:00 UTC,
/// a day and a bit before the 2024-03-01 slots the suites book.
pub fn harness(config: TestConfig) -> Harness {
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 2, 28, 12, 0, 0).unwrap());
    let engine = SchedulingEngine::with_collaborators(
        &config.to_app_config(),
        notifier.clone(),
        Arc::new(clock.clone()),
    )
    .unwrap();

    Harness {
        engine: Arc::new(engine),
        notifier,
        clock,
    }
}

pub fn patient(n: u32) -> PatientId {
    PatientId::parse(&format!("+52155000{:05}", n)).unwrap()
}

pub fn slot(raw: &str) -> SlotId {
    raw.parse().unwrap()
}

pub fn booked(outcome: BookingOutcome) -> Appointment {
    match outcome {
        BookingOutcome::Booked { appointment } => appointment,
        other => panic!("expected a booking, got {:?}", other),
    }
}
