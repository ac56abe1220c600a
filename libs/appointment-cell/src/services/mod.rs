pub mod engine;
pub mod lifecycle;
pub mod locks;
pub mod retry;
pub mod store;
pub mod sweeps;

pub use engine::{EngineSettings, SchedulingEngine};
pub use lifecycle::AppointmentLifecycleService;
pub use locks::{SlotGuard, SlotLockRegistry};
pub use retry::RetryPolicy;
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use sweeps::SweepReport;
