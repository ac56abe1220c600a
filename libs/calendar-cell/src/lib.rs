// libs/calendar-cell/src/lib.rs
//! Slot calendar for the clinic: turns working hours, slot length and
//! blackout dates into the grid of bookable slots. Pure configuration, it never
//! looks at bookings; remaining capacity is filled in by the appointment cell.

pub mod error;
pub mod models;
pub mod services;

pub use error::CalendarError;
pub use models::{BlackoutPeriod, CalendarConfig, DateRange, Slot, SlotFilter, SlotId, WorkingWindow};
pub use services::SlotCalendar;
