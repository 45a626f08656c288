//! Alert watch mode.
//!
//! Listens for alert frames punted by the switch after inference, prints
//! them, and appends each to an alerts CSV. The controller core never acts
//! on these results; watch mode exists for operators following a deployment
//! live.

use crate::audit::AuditError;
use crate::codec::{AlertFrame, SensorReading};
use chrono::Utc;
use std::fs::File;
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decoded-and-stamped alert, ready for display and logging.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub reception_time: String,
    pub alert: AlertFrame,
}

impl AlertRecord {
    pub fn now(alert: AlertFrame) -> Self {
        Self {
            reception_time: Utc::now().format(TIME_FORMAT).to_string(),
            alert,
        }
    }

    /// Console lines in the shape operators expect: one per condition, one
    /// for the severity score.
    pub fn display_lines(&self) -> Vec<String> {
        let a = &self.alert;
        vec![
            format!(
                "Condition-A prediction received @ {} -> Patient: {}, Value: {}",
                self.reception_time, a.patient_id, a.condition_a
            ),
            format!(
                "Condition-B prediction received @ {} -> Patient: {}, Value: {}",
                self.reception_time, a.patient_id, a.condition_b
            ),
            format!(
                "Severity received @ {} -> Patient: {}, Score: {}, Alert Level: {}",
                self.reception_time, a.patient_id, a.severity_score, a.severity_alert
            ),
        ]
    }
}

/// Append-only CSV of received alerts.
pub struct AlertLog {
    writer: std::sync::Mutex<csv::Writer<File>>,
}

impl AlertLog {
    /// Truncate `path` and write the header row.
    pub fn create(path: &PathBuf) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::Io(e.to_string()))?;
        }
        let file = File::create(path).map_err(|e| AuditError::Io(e.to_string()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record([
                "reception_time",
                "patient_id",
                "alert_timestamp",
                "condition_a",
                "condition_b",
                "severity_score",
                "severity_alert",
            ])
            .map_err(|e| AuditError::Csv(e.to_string()))?;
        writer.flush().map_err(|e| AuditError::Io(e.to_string()))?;
        Ok(Self {
            writer: std::sync::Mutex::new(writer),
        })
    }

    pub fn append(&self, record: &AlertRecord) -> Result<(), AuditError> {
        let a = &record.alert;
        let mut writer = self.writer.lock().expect("alert CSV writer poisoned");
        writer
            .write_record([
                record.reception_time.clone(),
                a.patient_id.to_string(),
                a.timestamp.to_string(),
                a.condition_a.to_string(),
                a.condition_b.to_string(),
                a.severity_score.to_string(),
                a.severity_alert.to_wire().to_string(),
            ])
            .map_err(|e| AuditError::Csv(e.to_string()))?;
        writer.flush().map_err(|e| AuditError::Io(e.to_string()))
    }
}

/// Blocking alert listener loop.
pub struct AlertWatcher {
    addr: SocketAddr,
    log: AlertLog,
}

impl AlertWatcher {
    pub fn new(addr: SocketAddr, log: AlertLog) -> Self {
        Self { addr, log }
    }

    /// Receive and log alerts until `running` is cleared. Sensor frames that
    /// reach this socket are ignored; malformed datagrams are dropped.
    pub fn run(&self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let socket = UdpSocket::bind(self.addr)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        println!("Watching for alert frames on {}...", socket.local_addr()?);

        let mut buf = [0u8; 2048];
        while running.load(Ordering::SeqCst) {
            let n = match socket.recv_from(&mut buf) {
                Ok((n, _)) => n,
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match AlertFrame::from_frame(&buf[..n]) {
                Ok(alert) => {
                    let record = AlertRecord::now(alert);
                    for line in record.display_lines() {
                        println!("{line}");
                    }
                    if let Err(e) = self.log.append(&record) {
                        eprintln!("Warning: could not write alert row: {e}");
                    }
                }
                Err(e) => {
                    // A sensor frame on the alert port is routine noise.
                    if SensorReading::from_frame(&buf[..n]).is_err() {
                        debug!("dropping undecodable frame: {e}");
                    }
                }
            }
        }
        Ok(())
    }
}
