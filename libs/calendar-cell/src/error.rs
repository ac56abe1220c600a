use thiserror::Error;

use shared_models::SchedulingError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid calendar configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid slot id '{0}', expected YYYY-MM-DDTHH:MM")]
    InvalidSlotId(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

impl From<CalendarError> for SchedulingError {
    fn from(err: CalendarError) -> Self {
        SchedulingError::InvalidSlot(err.to_string())
    }
}
