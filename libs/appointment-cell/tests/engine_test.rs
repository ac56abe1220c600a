mod common;

use assert_matches::assert_matches;
use calendar_cell::DateRange;
use chrono::{Duration, NaiveDate, TimeZone, Utc};

use appointment_cell::models::{AppointmentStatus, BookingOutcome};
use common::{booked, harness, patient, slot};
use notification_cell::{DeliveryOutcome, NotificationKind};
use shared_models::SchedulingError;
use shared_utils::test_utils::TestConfig;
use waitlist_cell::{ExpiryReason, WaitlistStatus, WaitlistTarget};

fn march_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

#[tokio::test]
async fn test_availability_for_empty_day() {
    let h = harness(TestConfig::with_capacity(2));

    let slots = h
        .engine
        .list_availability(DateRange::single(march_first()), false)
        .await
        .unwrap();

    assert_eq!(slots.len(), 4);
    assert!(slots.iter().all(|s| s.slot.remaining == 2 && s.confirmed == 0));
}

#[tokio::test]
async fn test_availability_hides_full_and_past_slots() {
    let h = harness(TestConfig::default());
    booked(h.engine.book(patient(1), slot("2024-03-01T09:00")).await.unwrap());

    let open = h
        .engine
        .list_availability(DateRange::single(march_first()), false)
        .await
        .unwrap();
    assert_eq!(open.len(), 3);

    let everything = h
        .engine
        .list_availability(DateRange::single(march_first()), true)
        .await
        .unwrap();
    assert_eq!(everything.len(), 4);
    assert_eq!(everything[0].slot.remaining, 0);

    h.clock.set(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    let later = h
        .engine
        .list_availability(DateRange::single(march_first()), true)
        .await
        .unwrap();
    let ids: Vec<String> = later.iter().map(|s| s.slot.id.to_string()).collect();
    assert_eq!(ids, vec!["2024-03-01T10:30"]);
}

#[tokio::test]
async fn test_waitlist_scenario_book_full_cancel_promote_claim() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");

    let first = booked(h.engine.book(patient(1), s).await.unwrap());
    assert_eq!(first.status, AppointmentStatus::Confirmed);

    let second = h.engine.book(patient(2), s).await.unwrap();
    assert_matches!(
        second,
        BookingOutcome::WaitlistOffered { ref offer } if offer.slot_id == s && offer.date == march_first()
    );

    let entry = h
        .engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();
    assert_eq!(entry.status, WaitlistStatus::Waiting);

    let cancelled = h.engine.cancel(first.id).await.unwrap();
    assert_eq!(cancelled.appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.promoted.len(), 1);
    assert_eq!(cancelled.promoted[0].id, entry.id);

    let promoted = h.engine.get_waitlist_entry(entry.id).await.unwrap();
    assert_eq!(promoted.status, WaitlistStatus::Promoted);
    assert_eq!(promoted.offered_slot, Some(s));
    assert_eq!(
        promoted.hold_expires_at,
        Some(h.engine.now() + Duration::minutes(30))
    );

    let offers = h.notifier.sent_of_kind(NotificationKind::WaitlistOffer);
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].0, patient(2));

    // The held unit is not available to anyone else.
    assert_matches!(
        h.engine.book(patient(3), s).await.unwrap(),
        BookingOutcome::WaitlistOffered { .. }
    );

    h.clock.advance(Duration::minutes(10));
    let claimed = booked(h.engine.book(patient(2), s).await.unwrap());
    assert_eq!(claimed.status, AppointmentStatus::Confirmed);
    assert_eq!(
        h.engine.get_waitlist_entry(entry.id).await.unwrap().status,
        WaitlistStatus::Claimed
    );
}

#[tokio::test]
async fn test_cancellation_promotes_earliest_entry_first() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let appointment = booked(h.engine.book(patient(1), s).await.unwrap());
    for (n, raw) in [(10, "2024-03-01T09:30"), (11, "2024-03-01T10:00"), (12, "2024-03-01T10:30")] {
        booked(h.engine.book(patient(n), slot(raw)).await.unwrap());
    }

    let a = h
        .engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(1));
    let b = h
        .engine
        .waitlist_add(patient(3), WaitlistTarget::Date(march_first()))
        .await
        .unwrap();

    let outcome = h.engine.cancel(appointment.id).await.unwrap();
    let promoted: Vec<_> = outcome.promoted.iter().map(|e| e.id).collect();
    assert_eq!(promoted, vec![a.id]);

    assert_eq!(
        h.engine.get_waitlist_entry(b.id).await.unwrap().status,
        WaitlistStatus::Waiting
    );
}

#[tokio::test]
async fn test_promotion_fills_each_freed_unit() {
    let h = harness(TestConfig::with_capacity(2));
    let s = slot("2024-03-01T09:00");
    let one = booked(h.engine.book(patient(1), s).await.unwrap());
    let two = booked(h.engine.book(patient(2), s).await.unwrap());

    for n in 3..=5 {
        h.engine
            .waitlist_add(patient(n), WaitlistTarget::Slot(s))
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(1));
    }

    assert_eq!(h.engine.cancel(one.id).await.unwrap().promoted.len(), 1);
    let second = h.engine.cancel(two.id).await.unwrap();
    assert_eq!(second.promoted.len(), 1);
    assert_eq!(second.promoted[0].patient_id, patient(4));

    let slots = h
        .engine
        .list_availability(DateRange::single(march_first()), true)
        .await
        .unwrap();
    assert_eq!(slots[0].held, 2);
    assert_eq!(slots[0].slot.remaining, 0);
}

#[tokio::test]
async fn test_double_cancel_reports_already_cancelled() {
    let h = harness(TestConfig::default());
    let appointment = booked(h.engine.book(patient(1), slot("2024-03-01T09:00")).await.unwrap());

    h.engine.cancel(appointment.id).await.unwrap();
    let before = h.engine.get_appointment(appointment.id).await.unwrap();

    for _ in 0..2 {
        assert_matches!(
            h.engine.cancel(appointment.id).await,
            Err(SchedulingError::AlreadyCancelled(id)) if id == appointment.id
        );
    }
    assert_eq!(h.engine.get_appointment(appointment.id).await.unwrap(), before);

    assert_matches!(
        h.engine.cancel(uuid::Uuid::new_v4()).await,
        Err(SchedulingError::NotFound(_))
    );
}

#[tokio::test]
async fn test_invalid_and_past_slots_are_rejected() {
    let h = harness(TestConfig::default());

    assert_matches!(
        h.engine.book(patient(1), slot("2024-03-01T03:17")).await,
        Err(SchedulingError::InvalidSlot(_))
    );
    assert_matches!(
        h.engine.book(patient(1), slot("2024-02-27T09:00")).await,
        Err(SchedulingError::InvalidSlot(_))
    );
    assert_matches!(
        h.engine
            .waitlist_add(patient(1), WaitlistTarget::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()))
            .await,
        Err(SchedulingError::InvalidSlot(_))
    );
}

#[tokio::test]
async fn test_reschedule_moves_and_promotes_old_slot() {
    let h = harness(TestConfig::default());
    let nine = slot("2024-03-01T09:00");
    let ten = slot("2024-03-01T10:00");

    let original = booked(h.engine.book(patient(1), nine).await.unwrap());
    let waiting = h
        .engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(nine))
        .await
        .unwrap();

    let outcome = h.engine.reschedule(original.id, ten).await.unwrap();
    assert_eq!(outcome.appointment.slot_id, ten);
    assert_eq!(outcome.appointment.rescheduled_from, Some(original.id));
    assert_eq!(outcome.previous.status, AppointmentStatus::Cancelled);
    assert_eq!(outcome.promoted.len(), 1);
    assert_eq!(outcome.promoted[0].id, waiting.id);

    let confirmations = h.notifier.sent_of_kind(NotificationKind::Confirmation);
    assert_eq!(confirmations.len(), 2);
}

#[tokio::test]
async fn test_reschedule_into_full_slot_leaves_original_untouched() {
    let h = harness(TestConfig::default());
    let nine = slot("2024-03-01T09:00");
    let ten = slot("2024-03-01T10:00");

    let mine = booked(h.engine.book(patient(1), nine).await.unwrap());
    booked(h.engine.book(patient(2), ten).await.unwrap());

    assert_matches!(
        h.engine.reschedule(mine.id, ten).await,
        Err(SchedulingError::CapacityExceeded { .. })
    );

    let after = h.engine.get_appointment(mine.id).await.unwrap();
    assert_eq!(after, mine);
    assert_eq!(h.engine.list_patient_appointments(&patient(1)).await.unwrap().len(), 1);

    assert_matches!(
        h.engine.reschedule(mine.id, nine).await,
        Err(SchedulingError::AlreadyBooked(_))
    );
}

#[tokio::test]
async fn test_one_appointment_per_day() {
    let h = harness(TestConfig::with_capacity(2));
    let nine = slot("2024-03-01T09:00");
    let ten = slot("2024-03-01T10:00");

    let first = booked(h.engine.book(patient(1), nine).await.unwrap());
    assert_matches!(
        h.engine.book(patient(1), ten).await,
        Err(SchedulingError::PatientDayConflict(date)) if date == march_first()
    );
    assert_matches!(
        h.engine.book(patient(1), nine).await,
        Err(SchedulingError::AlreadyBooked(_))
    );

    // Moving within the same day is allowed.
    assert!(h.engine.reschedule(first.id, ten).await.is_ok());

    let mut relaxed = TestConfig::with_capacity(2);
    relaxed.one_appointment_per_day = false;
    let h = harness(relaxed);
    booked(h.engine.book(patient(1), nine).await.unwrap());
    booked(h.engine.book(patient(1), ten).await.unwrap());
}

#[tokio::test]
async fn test_lapsed_hold_passes_to_next_candidate() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let appointment = booked(h.engine.book(patient(1), s).await.unwrap());

    let first = h
        .engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(1));
    let second = h
        .engine
        .waitlist_add(patient(3), WaitlistTarget::Slot(s))
        .await
        .unwrap();

    h.engine.cancel(appointment.id).await.unwrap();
    h.clock.advance(Duration::minutes(31));

    let summary = h.engine.expire_holds().await.unwrap();
    assert_eq!(summary.expired.len(), 1);
    assert_eq!(summary.expired[0].id, first.id);
    assert_eq!(summary.promoted.len(), 1);
    assert_eq!(summary.promoted[0].id, second.id);

    let lapsed = h.engine.get_waitlist_entry(first.id).await.unwrap();
    assert_eq!(lapsed.status, WaitlistStatus::Expired);
    assert_eq!(lapsed.expiry_reason, Some(ExpiryReason::HoldLapsed));

    // The first patient can no longer jump the queue.
    assert_matches!(
        h.engine.book(patient(2), s).await.unwrap(),
        BookingOutcome::WaitlistOffered { .. }
    );
    booked(h.engine.book(patient(3), s).await.unwrap());
}

#[tokio::test]
async fn test_lapsed_hold_is_expired_lazily_on_book() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let appointment = booked(h.engine.book(patient(1), s).await.unwrap());
    let entry = h
        .engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();

    h.engine.cancel(appointment.id).await.unwrap();
    h.clock.advance(Duration::hours(1));

    // No sweep ran; booking notices the lapse itself.
    booked(h.engine.book(patient(4), s).await.unwrap());
    assert_eq!(
        h.engine.get_waitlist_entry(entry.id).await.unwrap().status,
        WaitlistStatus::Expired
    );
}

#[tokio::test]
async fn test_hold_never_outlives_slot_start() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let appointment = booked(h.engine.book(patient(1), s).await.unwrap());
    h.engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();

    h.clock.set(Utc.with_ymd_and_hms(2024, 3, 1, 8, 50, 0).unwrap());
    let outcome = h.engine.cancel(appointment.id).await.unwrap();

    assert_eq!(
        outcome.promoted[0].hold_expires_at,
        Some(h.engine.calendar().slot_start_utc(&s))
    );
}

#[tokio::test]
async fn test_removing_promoted_entry_repromotes() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let appointment = booked(h.engine.book(patient(1), s).await.unwrap());

    let first = h
        .engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(1));
    let second = h
        .engine
        .waitlist_add(patient(3), WaitlistTarget::Slot(s))
        .await
        .unwrap();

    h.engine.cancel(appointment.id).await.unwrap();
    let removed = h.engine.remove_waitlist_entry(first.id).await.unwrap();
    assert_eq!(removed.status, WaitlistStatus::Expired);
    assert_eq!(removed.expiry_reason, Some(ExpiryReason::Removed));

    assert_eq!(
        h.engine.get_waitlist_entry(second.id).await.unwrap().status,
        WaitlistStatus::Promoted
    );
    assert_eq!(h.engine.list_patient_waitlist(&patient(2)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_waitlist_entry() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let target = WaitlistTarget::Slot(s);
    booked(h.engine.book(patient(2), s).await.unwrap());

    h.engine.waitlist_add(patient(1), target).await.unwrap();
    assert_matches!(
        h.engine.waitlist_add(patient(1), target).await,
        Err(SchedulingError::DuplicateEntry(_))
    );

    // Waiting on a slot one already holds is meaningless.
    assert_matches!(
        h.engine.waitlist_add(patient(2), target).await,
        Err(SchedulingError::AlreadyBooked(_))
    );
}

#[tokio::test]
async fn test_waitlist_on_free_slot_is_refused_and_does_not_block_booking() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");

    assert_matches!(
        h.engine.waitlist_add(patient(2), WaitlistTarget::Slot(s)).await,
        Err(SchedulingError::SlotAvailable(id)) if id == s.to_string()
    );
    assert!(h.engine.list_patient_waitlist(&patient(2)).await.unwrap().is_empty());

    let appointment = booked(h.engine.book(patient(3), s).await.unwrap());
    assert_eq!(appointment.patient_id, patient(3));
    assert!(h.notifier.sent_of_kind(NotificationKind::WaitlistOffer).is_empty());
}

#[tokio::test]
async fn test_waitlist_by_date_needs_every_slot_taken() {
    let h = harness(TestConfig::default());
    let by_date = WaitlistTarget::Date(march_first());
    for (n, raw) in [(1, "2024-03-01T09:00"), (2, "2024-03-01T09:30"), (3, "2024-03-01T10:00")] {
        booked(h.engine.book(patient(n), slot(raw)).await.unwrap());
    }

    assert_matches!(
        h.engine.waitlist_add(patient(9), by_date).await,
        Err(SchedulingError::SlotAvailable(id)) if id == "2024-03-01T10:30"
    );

    booked(h.engine.book(patient(4), slot("2024-03-01T10:30")).await.unwrap());
    let entry = h.engine.waitlist_add(patient(9), by_date).await.unwrap();
    assert_eq!(entry.status, WaitlistStatus::Waiting);
}

#[tokio::test]
async fn test_booking_only_reoffers_units_freed_by_lapsed_holds() {
    let h = harness(TestConfig::with_capacity(2));
    let s = slot("2024-03-01T09:00");
    let one = booked(h.engine.book(patient(1), s).await.unwrap());
    booked(h.engine.book(patient(2), s).await.unwrap());

    let first = h
        .engine
        .waitlist_add(patient(3), WaitlistTarget::Slot(s))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(1));
    let second = h
        .engine
        .waitlist_add(patient(4), WaitlistTarget::Slot(s))
        .await
        .unwrap();

    h.engine.cancel(one.id).await.unwrap();
    h.clock.advance(Duration::minutes(31));

    // The lapsed unit goes to the next waiter, not to the newcomer.
    assert_matches!(
        h.engine.book(patient(5), s).await.unwrap(),
        BookingOutcome::WaitlistOffered { .. }
    );
    assert_eq!(
        h.engine.get_waitlist_entry(first.id).await.unwrap().status,
        WaitlistStatus::Expired
    );
    assert_eq!(
        h.engine.get_waitlist_entry(second.id).await.unwrap().status,
        WaitlistStatus::Promoted
    );
    assert_eq!(h.notifier.sent_of_kind(NotificationKind::WaitlistOffer).len(), 2);
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_booking() {
    let h = harness(TestConfig::default());
    h.notifier.set_failing(true);

    let appointment = booked(h.engine.book(patient(1), slot("2024-03-01T09:00")).await.unwrap());
    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    assert!(h.notifier.sent().is_empty());

    let log = h.engine.list_patient_messages(&patient(1)).await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, NotificationKind::Confirmation);
    assert_eq!(log[0].attempted_at, h.engine.now());
    assert_matches!(&log[0].outcome, DeliveryOutcome::Failed { error } if error.contains("500"));
}

#[tokio::test]
async fn test_every_delivery_attempt_is_logged() {
    let h = harness(TestConfig::default());
    let s = slot("2024-03-01T09:00");
    let appointment = booked(h.engine.book(patient(1), s).await.unwrap());
    h.engine
        .waitlist_add(patient(2), WaitlistTarget::Slot(s))
        .await
        .unwrap();
    h.engine.cancel(appointment.id).await.unwrap();

    let recent = h.engine.delivery_log().recent(10).await;
    let kinds: Vec<_> = recent.iter().map(|r| (r.patient_id.clone(), r.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            (patient(2), NotificationKind::WaitlistOffer),
            (patient(1), NotificationKind::Confirmation),
        ]
    );
    assert!(recent.iter().all(|r| r.outcome.is_delivered()));
    assert_eq!(recent[1].payload.appointment_id, Some(appointment.id));
}
