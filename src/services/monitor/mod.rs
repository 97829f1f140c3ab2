pub mod cycle;
pub mod engine;
pub mod types;

pub use cycle::run_cycle;
pub use engine::MonitorEngine;
pub use types::{CycleKind, CycleOutcome, FetchCapability, FetchError, PollerState, TrackedEvent};
