use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::ExternalService(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::warn!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Failures of the scheduling core. Everything except `TransientStorage` is a
/// domain outcome that is reported to the caller untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Slot {slot_id} is fully booked")]
    CapacityExceeded { slot_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Appointment {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("Patient already has a waitlist entry for {0}")]
    DuplicateEntry(String),

    #[error("Patient already holds slot {0}")]
    AlreadyBooked(String),

    #[error("Patient already has an appointment on {0}")]
    PatientDayConflict(NaiveDate),

    #[error("Slot {0} has free capacity, book it instead")]
    SlotAvailable(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invalid patient identifier: {0}")]
    InvalidPatient(String),

    #[error("Transient storage error: {0}")]
    TransientStorage(String),
}

impl SchedulingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SchedulingError::TransientStorage(_))
    }
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        let message = err.to_string();
        match err {
            SchedulingError::InvalidSlot(_) | SchedulingError::InvalidPatient(_) => {
                AppError::BadRequest(message)
            }
            SchedulingError::NotFound(_) => AppError::NotFound(message),
            SchedulingError::CapacityExceeded { .. }
            | SchedulingError::AlreadyCancelled(_)
            | SchedulingError::DuplicateEntry(_)
            | SchedulingError::AlreadyBooked(_)
            | SchedulingError::PatientDayConflict(_)
            | SchedulingError::SlotAvailable(_)
            | SchedulingError::InvalidStatusTransition { .. } => AppError::Conflict(message),
            SchedulingError::TransientStorage(_) => AppError::Unavailable(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        assert_matches!(
            AppError::from(SchedulingError::InvalidSlot("03:17".into())),
            AppError::BadRequest(_)
        );
        assert_matches!(
            AppError::from(SchedulingError::NotFound("appointment".into())),
            AppError::NotFound(_)
        );
        assert_matches!(
            AppError::from(SchedulingError::AlreadyCancelled(Uuid::nil())),
            AppError::Conflict(_)
        );
        assert_matches!(
            AppError::from(SchedulingError::SlotAvailable("2024-03-01T09:00".into())),
            AppError::Conflict(_)
        );
        assert_matches!(
            AppError::from(SchedulingError::TransientStorage("timeout".into())),
            AppError::Unavailable(_)
        );
    }

    #[test]
    fn test_only_storage_errors_are_transient() {
        assert!(SchedulingError::TransientStorage("lock".into()).is_transient());
        assert!(!SchedulingError::CapacityExceeded { slot_id: "x".into() }.is_transient());
        assert!(!SchedulingError::DuplicateEntry("x".into()).is_transient());
    }

    #[test]
    fn test_app_error_response_status() {
        let response = AppError::Conflict("full".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::Unavailable("busy".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
