//! Submission decisions for patient windows.
//!
//! Every ingested event, real reading or heartbeat sentinel, flows through
//! [`SubmissionGate::ingest`]. A window is submitted either the moment its
//! last slot is observed, or on the first heartbeat tick that finds it older
//! than the timeout with slots still missing (those are imputed first).
//! Either way the window is consumed atomically, so each window is submitted
//! at most once; a failed send is logged and not retried.

use crate::audit::SharedAuditLog;
use crate::channel::SubmitSink;
use crate::codec::{FeatureFrame, SensorReading};
use crate::window::impute::ImputationEngine;
use crate::window::store::{SlotOutcome, WindowStore};
use crate::NUM_SENSORS;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// All slots observed.
    Complete,
    /// Heartbeat tick found the window past the timeout.
    Timeout,
}

/// Result of ingesting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// A window was finalized and handed to the inference channel.
    Submitted {
        trigger: SubmitTrigger,
        imputed: usize,
    },
    /// The reading was stored; the window is still waiting.
    Stored,
    /// Nothing changed: duplicate slot, out-of-range id, or a heartbeat
    /// with no window ready to force.
    Ignored,
}

/// Gate configuration, derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Declared population; readings outside `[0, num_patients)` are dropped.
    pub num_patients: u32,
    /// Age at which a heartbeat tick forces an incomplete window.
    pub window_timeout: Duration,
    /// Whether heartbeat sentinels refresh `last_update_at`, shortening the
    /// data staleness reported at submission. Never affects the timeout
    /// clock.
    pub heartbeat_extends_staleness: bool,
}

/// Serialized decision point between the window store and the inference
/// channel.
pub struct SubmissionGate<S: SubmitSink> {
    store: WindowStore,
    engine: ImputationEngine,
    sink: Arc<S>,
    audit: SharedAuditLog,
    config: GateConfig,
}

impl<S: SubmitSink> SubmissionGate<S> {
    pub fn new(
        engine: ImputationEngine,
        sink: Arc<S>,
        audit: SharedAuditLog,
        config: GateConfig,
    ) -> Self {
        Self {
            store: WindowStore::new(),
            engine,
            sink,
            audit,
            config,
        }
    }

    /// Process one ingested event.
    pub fn ingest(&mut self, reading: SensorReading) -> GateOutcome {
        if reading.is_heartbeat() {
            return self.on_heartbeat(reading.patient_id);
        }
        if reading.patient_id >= self.config.num_patients {
            self.audit.record_out_of_range();
            debug!(
                patient_id = reading.patient_id,
                "reading outside declared population, dropped"
            );
            return GateOutcome::Ignored;
        }
        match self.store.update_slot(
            reading.patient_id,
            reading.sensor_id,
            reading.feature_value,
            reading.timestamp,
        ) {
            SlotOutcome::InvalidSensor => {
                self.audit.record_out_of_range();
                debug!(
                    patient_id = reading.patient_id,
                    sensor_id = reading.sensor_id,
                    "unknown sensor id, dropped"
                );
                GateOutcome::Ignored
            }
            SlotOutcome::DuplicateIgnored => {
                self.audit.record_duplicate();
                GateOutcome::Ignored
            }
            SlotOutcome::Inserted { now_complete, .. } => {
                self.audit.record_reading();
                if now_complete {
                    self.finalize(reading.patient_id, SubmitTrigger::Complete)
                } else {
                    GateOutcome::Stored
                }
            }
        }
    }

    /// Heartbeat tick for one patient: force the window if it is past the
    /// timeout. Empty (untracked) windows are never forced.
    fn on_heartbeat(&mut self, patient_id: u32) -> GateOutcome {
        if patient_id >= self.config.num_patients {
            return GateOutcome::Ignored;
        }
        if self.config.heartbeat_extends_staleness {
            self.store.touch(patient_id);
        }
        match self.store.age_of(patient_id) {
            Some(age) if age >= self.config.window_timeout => {
                self.finalize(patient_id, SubmitTrigger::Timeout)
            }
            _ => GateOutcome::Ignored,
        }
    }

    /// Consume the window, impute whatever is missing, and submit.
    fn finalize(&mut self, patient_id: u32, trigger: SubmitTrigger) -> GateOutcome {
        let Some(snapshot) = self.store.snapshot_and_clear(patient_id) else {
            // Lost the race against a concurrent trigger; nothing to do.
            return GateOutcome::Ignored;
        };

        let mut features = [0u16; NUM_SENSORS];
        let mut imputed = 0usize;
        for (sensor_id, slot) in snapshot.slots.iter().enumerate() {
            features[sensor_id] = match slot {
                Some(value) => *value,
                None => {
                    let value = self.engine.impute(sensor_id);
                    if let Err(e) = self.audit.log_imputation(patient_id, sensor_id, value) {
                        warn!("failed to write imputation audit row: {e}");
                    }
                    debug!(
                        patient_id,
                        sensor = self.engine.label(sensor_id).unwrap_or("unknown"),
                        value,
                        "imputed missing slot"
                    );
                    imputed += 1;
                    value
                }
            };
        }

        let frame = FeatureFrame::request(patient_id, snapshot.window_timestamp, features);
        if let Err(e) = self.sink.submit_features(&frame) {
            // At-most-once: the window stays consumed even when the send
            // fails; the loss surfaces downstream as a missing alert.
            warn!(patient_id, "submission to inference channel failed: {e}");
        }
        match trigger {
            SubmitTrigger::Complete => self.audit.record_window_completed(),
            SubmitTrigger::Timeout => self.audit.record_window_forced(),
        }
        info!(
            patient_id,
            ?trigger,
            imputed,
            data_stale_ms = snapshot.data_stale_for.as_millis() as u64,
            "window submitted"
        );
        GateOutcome::Submitted { trigger, imputed }
    }

    /// Number of windows currently open.
    pub fn open_windows(&self) -> usize {
        self.store.tracked_patients()
    }
}
