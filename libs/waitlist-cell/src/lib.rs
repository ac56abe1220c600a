// libs/waitlist-cell/src/lib.rs
//! Waitlist of patients wanting a slot or a day that is currently full.
//! Entries move `waiting -> promoted -> claimed | expired`; the scheduling
//! engine decides when, this cell only records it.

pub mod models;
pub mod services;

pub use models::{ExpiryReason, WaitlistEntry, WaitlistStatus, WaitlistTarget};
pub use services::{InMemoryWaitlist, Waitlist};
