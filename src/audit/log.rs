//! Imputation audit log and session counters.
//!
//! Two outputs: an append-only CSV with one row per imputed slot
//! (`reception_time, patient_id, sensor_id, old_value, new_value`; the
//! `old_value` column is always 0, the unobserved wire value), and a set of
//! session counters persisted as JSON so the `status` command can report on
//! a running or past session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Timestamp format used in CSV rows and log lines.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors from the audit layer. Never fatal to the controller.
#[derive(Debug)]
pub enum AuditError {
    Io(String),
    Csv(String),
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditError::Io(e) => write!(f, "audit IO error: {e}"),
            AuditError::Csv(e) => write!(f, "audit CSV error: {e}"),
        }
    }
}

impl std::error::Error for AuditError {}

/// Session counters plus the imputation CSV writer.
pub struct AuditLog {
    readings_received: AtomicU64,
    duplicates_ignored: AtomicU64,
    malformed_dropped: AtomicU64,
    out_of_range_dropped: AtomicU64,
    heartbeats_sent: AtomicU64,
    windows_completed: AtomicU64,
    windows_forced: AtomicU64,
    slots_imputed: AtomicU64,
    session_start: DateTime<Utc>,
    csv_writer: Option<Mutex<csv::Writer<File>>>,
    stats_path: Option<PathBuf>,
}

impl AuditLog {
    /// Counters only; no CSV, no persistence. Used in tests and by the
    /// `watch` command.
    pub fn new() -> Self {
        Self {
            readings_received: AtomicU64::new(0),
            duplicates_ignored: AtomicU64::new(0),
            malformed_dropped: AtomicU64::new(0),
            out_of_range_dropped: AtomicU64::new(0),
            heartbeats_sent: AtomicU64::new(0),
            windows_completed: AtomicU64::new(0),
            windows_forced: AtomicU64::new(0),
            slots_imputed: AtomicU64::new(0),
            session_start: Utc::now(),
            csv_writer: None,
            stats_path: None,
        }
    }

    /// Full audit log: truncates the CSV at `csv_path` and writes the header
    /// row, persists counters to `stats_path` on [`AuditLog::save`].
    pub fn with_files(csv_path: PathBuf, stats_path: PathBuf) -> Result<Self, AuditError> {
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::Io(e.to_string()))?;
        }
        let file = File::create(&csv_path).map_err(|e| AuditError::Io(e.to_string()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(["reception_time", "patient_id", "sensor_id", "old_value", "new_value"])
            .map_err(|e| AuditError::Csv(e.to_string()))?;
        writer.flush().map_err(|e| AuditError::Io(e.to_string()))?;

        let mut log = Self::new();
        log.csv_writer = Some(Mutex::new(writer));
        log.stats_path = Some(stats_path);
        Ok(log)
    }

    /// Record one imputed slot: bump the counter and append a CSV row. The
    /// `old_value` column is always 0.
    pub fn log_imputation(
        &self,
        patient_id: u32,
        sensor_id: usize,
        new_value: u16,
    ) -> Result<(), AuditError> {
        self.slots_imputed.fetch_add(1, Ordering::Relaxed);
        if let Some(ref writer) = self.csv_writer {
            let reception_time = Utc::now().format(TIME_FORMAT).to_string();
            let mut writer = writer.lock().expect("audit CSV writer poisoned");
            writer
                .write_record([
                    reception_time,
                    patient_id.to_string(),
                    sensor_id.to_string(),
                    "0".to_string(),
                    new_value.to_string(),
                ])
                .map_err(|e| AuditError::Csv(e.to_string()))?;
            writer.flush().map_err(|e| AuditError::Io(e.to_string()))?;
        }
        Ok(())
    }

    pub fn record_reading(&self) {
        self.readings_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_range(&self) {
        self.out_of_range_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one full heartbeat sweep over `population` patients.
    pub fn record_heartbeat_sweep(&self, population: u64) {
        self.heartbeats_sent.fetch_add(population, Ordering::Relaxed);
    }

    /// Record a submission triggered by a complete window.
    pub fn record_window_completed(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submission forced by the timeout path.
    pub fn record_window_forced(&self) {
        self.windows_forced.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            readings_received: self.readings_received.load(Ordering::Relaxed),
            duplicates_ignored: self.duplicates_ignored.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            out_of_range_dropped: self.out_of_range_dropped.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            windows_forced: self.windows_forced.load(Ordering::Relaxed),
            slots_imputed: self.slots_imputed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable session summary for display on shutdown.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Readings received: {}\n\
             - Duplicates ignored: {}\n\
             - Malformed packets dropped: {}\n\
             - Out-of-range readings dropped: {}\n\
             - Heartbeats sent: {}\n\
             - Windows submitted complete: {}\n\
             - Windows submitted after timeout: {}\n\
             - Slots imputed: {}\n\
             - Session duration: {} seconds",
            stats.readings_received,
            stats.duplicates_ignored,
            stats.malformed_dropped,
            stats.out_of_range_dropped,
            stats.heartbeats_sent,
            stats.windows_completed,
            stats.windows_forced,
            stats.slots_imputed,
            stats.session_duration_secs
        )
    }

    /// Persist counters as JSON, if a stats path was configured.
    pub fn save(&self) -> Result<(), AuditError> {
        if let Some(ref path) = self.stats_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| AuditError::Io(e.to_string()))?;
            }
            let json = serde_json::to_string_pretty(&self.stats())
                .map_err(|e| AuditError::Io(e.to_string()))?;
            std::fs::write(path, json).map_err(|e| AuditError::Io(e.to_string()))?;
        }
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub readings_received: u64,
    pub duplicates_ignored: u64,
    pub malformed_dropped: u64,
    pub out_of_range_dropped: u64,
    pub heartbeats_sent: u64,
    pub windows_completed: u64,
    pub windows_forced: u64,
    pub slots_imputed: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

/// Create a new shared, counters-only audit log.
pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let log = AuditLog::new();
        log.record_reading();
        log.record_reading();
        log.record_duplicate();
        log.record_window_completed();
        log.record_heartbeat_sweep(2000);

        let stats = log.stats();
        assert_eq!(stats.readings_received, 2);
        assert_eq!(stats.duplicates_ignored, 1);
        assert_eq!(stats.windows_completed, 1);
        assert_eq!(stats.heartbeats_sent, 2000);
    }

    #[test]
    fn test_imputation_rows_written() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("imputation_log.csv");
        let stats_path = dir.path().join("stats.json");
        let log = AuditLog::with_files(csv_path.clone(), stats_path).unwrap();

        log.log_imputation(1000, 6, 95).unwrap();
        log.log_imputation(1000, 7, 1).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "reception_time,patient_id,sensor_id,old_value,new_value"
        );
        assert!(lines[1].ends_with(",1000,6,0,95"));
        assert!(lines[2].ends_with(",1000,7,0,1"));
        assert_eq!(log.stats().slots_imputed, 2);
    }

    #[test]
    fn test_stats_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("imputation_log.csv");
        let stats_path = dir.path().join("stats.json");
        let log = AuditLog::with_files(csv_path, stats_path.clone()).unwrap();

        log.record_window_forced();
        log.save().unwrap();

        let content = std::fs::read_to_string(&stats_path).unwrap();
        let stats: AuditStats = serde_json::from_str(&content).unwrap();
        assert_eq!(stats.windows_forced, 1);
    }

    #[test]
    fn test_summary_format() {
        let log = AuditLog::new();
        let summary = log.summary();
        assert!(summary.contains("Readings received"));
        assert!(summary.contains("Slots imputed"));
        assert!(summary.contains("Windows submitted after timeout"));
    }
}
