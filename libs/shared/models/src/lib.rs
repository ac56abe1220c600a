pub mod error;
pub mod patient;

pub use error::{AppError, SchedulingError};
pub use patient::PatientId;
