//! Wardlink Controller - window assembly for in-network clinical inference.
//!
//! The deterioration-detection model itself runs inside a programmable
//! switch pipeline. This crate is the controller at its side: it assembles
//! a per-patient feature window from out-of-order, possibly-missing sensor
//! readings, decides when a window is complete enough to submit, imputes
//! whatever is still missing, and guarantees at-most-once submission per
//! window, all under best-effort packet delivery.
//!
//! # Guarantees
//!
//! - **First value wins**: a retransmitted reading never overwrites an
//!   observed slot within the same window
//! - **At-most-once submission**: a window is consumed atomically by
//!   whichever trigger (completion or timeout) fires first
//! - **Bounded timeout latency**: a stuck window is forced within one
//!   heartbeat interval of crossing the timeout
//! - **Audited imputation**: every synthesized value lands in the audit CSV
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Wardlink Controller                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Listener   │──▶│   Window    │──▶│ Submission  │──▶ switch
//! │  │ (packet-in) │   │    Store    │   │    Gate     │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         ▲                                   │                │
//! │  ┌─────────────┐                    ┌─────────────┐          │
//! │  │  Heartbeat  │                    │ Imputation  │          │
//! │  │  Scheduler  │                    │ + Audit CSV │          │
//! │  └─────────────┘                    └─────────────┘          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wardlink_controller::{
//!     audit, channel, config::Config,
//!     window::{default_ranges, GateConfig, ImputationEngine, SubmissionGate},
//! };
//!
//! let config = Config::default();
//! let sink = Arc::new(
//!     channel::BlockingInferenceClient::new(channel::ChannelConfig::new(config.switch_addr))
//!         .expect("failed to open inference channel"),
//! );
//! let mut gate = SubmissionGate::new(
//!     ImputationEngine::new(default_ranges()),
//!     sink,
//!     audit::create_shared_log(),
//!     GateConfig {
//!         num_patients: config.num_patients,
//!         window_timeout: config.window_timeout,
//!         heartbeat_extends_staleness: config.heartbeat_extends_staleness,
//!     },
//! );
//! // Readings from the listener are fed into gate.ingest(...)
//! ```

pub mod audit;
pub mod channel;
pub mod codec;
pub mod config;
pub mod heartbeat;
pub mod listener;
pub mod watch;
pub mod window;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use channel::{
    BlockingInferenceClient, ChannelConfig, ChannelError, InferenceClient, SubmitSink,
};
pub use codec::{AlertFrame, DecodeError, FeatureFrame, SensorReading};
pub use config::Config;
pub use heartbeat::HeartbeatScheduler;
pub use listener::PacketListener;
pub use window::{GateConfig, GateOutcome, ImputationEngine, SubmissionGate, WindowStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sensor slots per patient window. Fixed by the wire format of the
/// observed deployment.
pub const NUM_SENSORS: usize = 10;
