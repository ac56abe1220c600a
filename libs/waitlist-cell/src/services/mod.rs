pub mod store;

pub use store::{InMemoryWaitlist, Waitlist};
