// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use calendar_cell::{DateRange, SlotId};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::{AppError, PatientId, SchedulingError};
use waitlist_cell::WaitlistTarget;

use crate::models::{
    AvailabilityQuery, BookAppointmentRequest, BookingOutcome, JoinWaitlistRequest, RescheduleAppointmentRequest,
};
use crate::services::engine::SchedulingEngine;

fn parse_patient(raw: &str) -> Result<PatientId, AppError> {
    Ok(PatientId::parse(raw)?)
}

fn parse_slot(raw: &str) -> Result<SlotId, AppError> {
    raw.parse::<SlotId>()
        .map_err(|e| AppError::from(SchedulingError::from(e)))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

pub async fn list_slots(
    State(engine): State<Arc<SchedulingEngine>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let range = DateRange::new(query.from, query.to.unwrap_or(query.from))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let slots = engine.list_availability(range, query.include_full).await?;
    debug!("Returning {} slot(s)", slots.len());

    Ok(Json(json!({
        "from": range.start,
        "to": range.end,
        "slots": slots,
        "total": slots.len()
    })))
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

/// 201 with the appointment, or 409 carrying a waitlist offer when the slot is full.
pub async fn book_appointment(
    State(engine): State<Arc<SchedulingEngine>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = parse_patient(&request.patient_id)?;
    let slot_id = parse_slot(&request.slot_id)?;

    match engine.book(patient_id, slot_id).await? {
        BookingOutcome::Booked { appointment } => Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "appointment": appointment
            })),
        )),
        BookingOutcome::WaitlistOffered { offer } => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "error": format!("Slot {} is fully booked", offer.slot_id),
                "waitlist_offer": offer
            })),
        )),
    }
}

pub async fn get_appointment(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = engine.get_appointment(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

pub async fn reschedule_appointment(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let new_slot = parse_slot(&request.new_slot_id)?;
    let outcome = engine.reschedule(appointment_id, new_slot).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "previous": outcome.previous,
        "waitlist_promoted": outcome.promoted.len()
    })))
}

pub async fn cancel_appointment(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine.cancel(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "waitlist_promoted": outcome.promoted.len()
    })))
}

pub async fn get_patient_appointments(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_patient(&patient_id)?;
    let appointments = engine.list_patient_appointments(&patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// WAITLIST
// ==============================================================================

pub async fn join_waitlist(
    State(engine): State<Arc<SchedulingEngine>>,
    Json(request): Json<JoinWaitlistRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = parse_patient(&request.patient_id)?;

    let target = match (request.slot_id.as_deref(), request.date) {
        (Some(slot), None) => WaitlistTarget::Slot(parse_slot(slot)?),
        (None, Some(date)) => WaitlistTarget::Date(date),
        _ => {
            return Err(AppError::ValidationError(
                "Provide exactly one of slot_id or date".to_string(),
            ))
        }
    };

    let entry = engine.waitlist_add(patient_id, target).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "entry": entry }))))
}

pub async fn remove_waitlist_entry(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = engine.remove_waitlist_entry(entry_id).await?;
    Ok(Json(json!({ "success": true, "entry": entry })))
}

pub async fn get_patient_waitlist(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_patient(&patient_id)?;
    let entries = engine.list_patient_waitlist(&patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "entries": entries,
        "total": entries.len()
    })))
}

// ==============================================================================
// MESSAGES
// ==============================================================================

pub async fn get_patient_messages(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_patient(&patient_id)?;
    let messages = engine.list_patient_messages(&patient_id).await;

    Ok(Json(json!({
        "patient_id": patient_id,
        "messages": messages,
        "total": messages.len()
    })))
}
