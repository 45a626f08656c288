//! Window assembly for the wardlink controller.
//!
//! This module contains:
//! - The per-patient window store (slot state, sharded locking)
//! - The imputation engine for slots missing at finalization
//! - The submission gate deciding when a window leaves the controller

pub mod gate;
pub mod impute;
pub mod store;

// Re-export commonly used types
pub use gate::{GateConfig, GateOutcome, SubmissionGate, SubmitTrigger};
pub use impute::{default_ranges, ImputationEngine, SensorRange};
pub use store::{PatientWindow, SlotOutcome, WindowSnapshot, WindowStore};
