// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::services::engine::SchedulingEngine;

pub fn appointment_routes(engine: Arc<SchedulingEngine>) -> Router {
    Router::new()
        // Availability
        .route("/slots", get(handlers::list_slots))

        // Appointment management
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))

        // Waitlist
        .route("/waitlist", post(handlers::join_waitlist))
        .route("/waitlist/{entry_id}", delete(handlers::remove_waitlist_entry))

        // Patient listings
        .route("/patients/{patient_id}/appointments", get(handlers::get_patient_appointments))
        .route("/patients/{patient_id}/waitlist", get(handlers::get_patient_waitlist))
        .route("/patients/{patient_id}/messages", get(handlers::get_patient_messages))

        .with_state(engine)
}
