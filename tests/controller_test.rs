//! Integration tests for the assembled controller pipeline.
//!
//! Each test wires the real listener and heartbeat scheduler to a gate
//! backed by a recording sink, then drives it over loopback UDP with
//! millisecond-scale timeouts.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use wardlink_controller::{
    audit::AuditLog,
    channel::{ChannelError, SubmitSink},
    codec::{FeatureFrame, SensorReading},
    heartbeat::HeartbeatScheduler,
    listener::PacketListener,
    window::{default_ranges, GateConfig, ImputationEngine, SubmissionGate},
    NUM_SENSORS,
};

/// Sink that records submissions instead of sending them anywhere.
struct RecordingSink {
    frames: Mutex<Vec<FeatureFrame>>,
    heartbeats_relayed: AtomicU64,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            heartbeats_relayed: AtomicU64::new(0),
        }
    }

    fn submissions(&self) -> Vec<FeatureFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl SubmitSink for RecordingSink {
    fn submit_features(&self, frame: &FeatureFrame) -> Result<(), ChannelError> {
        self.frames.lock().unwrap().push(*frame);
        Ok(())
    }

    fn relay_heartbeat(&self, _reading: &SensorReading) -> Result<(), ChannelError> {
        self.heartbeats_relayed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct TestPipeline {
    listener: PacketListener,
    scheduler: Option<HeartbeatScheduler<RecordingSink>>,
    sink: Arc<RecordingSink>,
    running: Arc<AtomicBool>,
    gate_thread: Option<thread::JoinHandle<()>>,
}

impl TestPipeline {
    /// Start listener + gate loop; with `heartbeat_interval` also the
    /// scheduler. Imputation is seeded for reproducibility.
    fn start(
        audit: Arc<AuditLog>,
        window_timeout: Duration,
        heartbeat_interval: Option<Duration>,
    ) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let mut listener = PacketListener::new("127.0.0.1:0".parse().unwrap());
        listener.start(audit.clone()).expect("listener start");

        let scheduler = heartbeat_interval.map(|interval| {
            let mut scheduler = HeartbeatScheduler::new(
                interval,
                4096,
                listener.sender(),
                sink.clone(),
                audit.clone(),
            );
            scheduler.start();
            scheduler
        });

        let mut gate = SubmissionGate::new(
            ImputationEngine::with_seed(default_ranges(), 99),
            sink.clone(),
            audit.clone(),
            GateConfig {
                num_patients: 4096,
                window_timeout,
                heartbeat_extends_staleness: false,
            },
        );

        let running = Arc::new(AtomicBool::new(true));
        let gate_running = running.clone();
        let receiver = listener.receiver().clone();
        let gate_thread = thread::spawn(move || {
            while gate_running.load(Ordering::SeqCst) {
                if let Ok(reading) = receiver.recv_timeout(Duration::from_millis(50)) {
                    gate.ingest(reading);
                }
            }
        });

        Self {
            listener,
            scheduler,
            sink,
            running,
            gate_thread: Some(gate_thread),
        }
    }

    fn send(&self, reading: &SensorReading) {
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        tx.send_to(&reading.to_frame(), self.listener.local_addr())
            .unwrap();
    }

    /// Poll until `count` submissions were recorded, or panic at deadline.
    fn wait_for_submissions(&self, count: usize, deadline: Duration) -> Vec<FeatureFrame> {
        let start = Instant::now();
        loop {
            let submissions = self.sink.submissions();
            if submissions.len() >= count {
                return submissions;
            }
            assert!(
                start.elapsed() < deadline,
                "expected {count} submissions, saw {} after {:?}",
                submissions.len(),
                deadline
            );
            thread::sleep(Duration::from_millis(20));
        }
    }

    fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.listener.stop();
        if let Some(handle) = self.gate_thread.take() {
            let _ = handle.join();
        }
    }
}

fn reading(patient_id: u32, sensor_id: u32, value: u16, timestamp: u64) -> SensorReading {
    SensorReading {
        patient_id,
        sensor_id,
        timestamp,
        feature_value: value,
    }
}

#[test]
fn test_complete_window_submits_immediately_without_imputation() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(
        AuditLog::with_files(dir.path().join("imputation_log.csv"), dir.path().join("stats.json"))
            .unwrap(),
    );
    // No heartbeats: completion alone must trigger the submission.
    let pipeline = TestPipeline::start(audit.clone(), Duration::from_secs(60), None);

    for sensor_id in 0..NUM_SENSORS as u32 {
        pipeline.send(&reading(2000, sensor_id, 100 + sensor_id as u16, 42));
    }

    let submissions = pipeline.wait_for_submissions(1, Duration::from_secs(3));
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].patient_id, 2000);
    assert_eq!(submissions[0].timestamp, 42);
    for sensor_id in 0..NUM_SENSORS {
        assert_eq!(submissions[0].features[sensor_id], 100 + sensor_id as u16);
    }

    // Zero imputation rows: the CSV holds only its header.
    let content = std::fs::read_to_string(dir.path().join("imputation_log.csv")).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert_eq!(audit.stats().windows_completed, 1);
    assert_eq!(audit.stats().slots_imputed, 0);

    pipeline.shutdown();
}

#[test]
fn test_timeout_forces_submission_with_imputed_slots() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(
        AuditLog::with_files(dir.path().join("imputation_log.csv"), dir.path().join("stats.json"))
            .unwrap(),
    );
    // Scaled-down deployment timings: 300ms timeout, 100ms heartbeat.
    let pipeline = TestPipeline::start(
        audit.clone(),
        Duration::from_millis(300),
        Some(Duration::from_millis(100)),
    );

    // Patient 1000 sends sensors 0-5 only, then goes quiet.
    for sensor_id in 0..6u32 {
        pipeline.send(&reading(1000, sensor_id, 70 + sensor_id as u16, 7));
    }

    let submissions = pipeline.wait_for_submissions(1, Duration::from_secs(5));
    assert_eq!(submissions[0].patient_id, 1000);
    assert_eq!(submissions[0].timestamp, 7);

    // Observed slots survive untouched; missing ones are imputed in range.
    let ranges = default_ranges();
    for sensor_id in 0..6 {
        assert_eq!(submissions[0].features[sensor_id], 70 + sensor_id as u16);
    }
    for sensor_id in 6..NUM_SENSORS {
        let value = submissions[0].features[sensor_id];
        assert!(
            value >= ranges[sensor_id].lo && value <= ranges[sensor_id].hi,
            "slot {sensor_id} imputed out of range: {value}"
        );
    }

    // Heartbeats keep sweeping, but the window was consumed: still exactly
    // one submission well past another timeout period.
    thread::sleep(Duration::from_millis(600));
    assert_eq!(pipeline.sink.submissions().len(), 1);

    // Exactly 4 audit rows for the 4 imputed slots of patient 1000.
    let content = std::fs::read_to_string(dir.path().join("imputation_log.csv")).unwrap();
    let rows: Vec<&str> = content.lines().skip(1).collect();
    assert_eq!(rows.len(), 4);
    for (row, sensor_id) in rows.iter().zip(6..NUM_SENSORS) {
        assert!(row.contains(&format!(",1000,{sensor_id},0,")));
    }

    let stats = audit.stats();
    assert_eq!(stats.windows_forced, 1);
    assert_eq!(stats.windows_completed, 0);
    assert_eq!(stats.slots_imputed, 4);
    assert!(stats.heartbeats_sent > 0);
    assert!(pipeline.sink.heartbeats_relayed.load(Ordering::Relaxed) > 0);

    pipeline.shutdown();
}

#[test]
fn test_duplicate_readings_are_idempotent_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(
        AuditLog::with_files(dir.path().join("imputation_log.csv"), dir.path().join("stats.json"))
            .unwrap(),
    );
    let pipeline = TestPipeline::start(
        audit.clone(),
        Duration::from_millis(200),
        Some(Duration::from_millis(100)),
    );

    // First value wins: the retransmissions carry different values.
    pipeline.send(&reading(7, 0, 111, 1));
    thread::sleep(Duration::from_millis(100));
    pipeline.send(&reading(7, 0, 222, 1));
    pipeline.send(&reading(7, 0, 223, 1));

    let submissions = pipeline.wait_for_submissions(1, Duration::from_secs(5));
    assert_eq!(submissions[0].features[0], 111);
    assert!(audit.stats().duplicates_ignored >= 2);

    pipeline.shutdown();
}
