//! Audit module for the wardlink controller.
//!
//! Tracks what the controller did to each window: every imputed slot is
//! written to an append-only CSV, and session counters cover the rest of
//! the observable behavior.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, AuditError, AuditLog, AuditStats, SharedAuditLog};
