//! Wall-clock heartbeat sweeps.
//!
//! One global ticker re-evaluates every patient each interval instead of
//! keeping a timer per patient. Each sweep, for every `patient_id` in
//! `[0, num_patients)`, the scheduler injects a zero-value sentinel reading
//! (`sensor_id = 999`) into the same ingest channel the listener feeds
//! (forcing the gate's timeout check to run) and relays a heartbeat frame
//! toward the switch. A failed relay for one patient is logged and the
//! sweep moves on; timeout precision is within one interval either way.

use crate::audit::SharedAuditLog;
use crate::channel::SubmitSink;
use crate::codec::SensorReading;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Granularity of the inter-sweep sleep, so stop() stays responsive.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Fixed-interval heartbeat producer.
pub struct HeartbeatScheduler<S: SubmitSink + Send + Sync + 'static> {
    interval: Duration,
    num_patients: u32,
    injector: Sender<SensorReading>,
    sink: Arc<S>,
    audit: SharedAuditLog,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<S: SubmitSink + Send + Sync + 'static> HeartbeatScheduler<S> {
    pub fn new(
        interval: Duration,
        num_patients: u32,
        injector: Sender<SensorReading>,
        sink: Arc<S>,
        audit: SharedAuditLog,
    ) -> Self {
        Self {
            interval,
            num_patients,
            injector,
            sink,
            audit,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the sweep thread. The first sweep runs one full interval after
    /// start, so freshly opened windows get a grace period.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let running = self.running.clone();
        let injector = self.injector.clone();
        let sink = self.sink.clone();
        let audit = self.audit.clone();
        let interval = self.interval;
        let num_patients = self.num_patients;

        self.handle = Some(thread::spawn(move || {
            while Self::sleep_interval(&running, interval) {
                for patient_id in 0..num_patients {
                    let heartbeat = SensorReading::heartbeat(patient_id);
                    if let Err(e) = sink.relay_heartbeat(&heartbeat) {
                        debug!(patient_id, "heartbeat relay failed: {e}");
                    }
                    if injector.send(heartbeat).is_err() {
                        // Gate loop is gone; shut the thread down.
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                }
                audit.record_heartbeat_sweep(num_patients as u64);
                info!(num_patients, "heartbeat sweep complete");
            }
        }));
    }

    /// Sleep one interval in slices; false once stop() was called.
    fn sleep_interval(running: &AtomicBool, interval: Duration) -> bool {
        let mut remaining = interval;
        while !remaining.is_zero() {
            if !running.load(Ordering::SeqCst) {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
        running.load(Ordering::SeqCst)
    }

    /// Stop the sweep thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<S: SubmitSink + Send + Sync + 'static> Drop for HeartbeatScheduler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::create_shared_log;
    use crate::channel::ChannelError;
    use crate::codec::FeatureFrame;
    use crossbeam_channel::bounded;
    use std::sync::atomic::AtomicU64;

    struct CountingSink {
        relayed: AtomicU64,
        fail_patient: Option<u32>,
    }

    impl SubmitSink for CountingSink {
        fn submit_features(&self, _frame: &FeatureFrame) -> Result<(), ChannelError> {
            Ok(())
        }

        fn relay_heartbeat(&self, reading: &SensorReading) -> Result<(), ChannelError> {
            if self.fail_patient == Some(reading.patient_id) {
                return Err(ChannelError::Timeout);
            }
            self.relayed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn test_sweep_covers_population_and_isolates_failures() {
        let (tx, rx) = bounded(1024);
        let sink = Arc::new(CountingSink {
            relayed: AtomicU64::new(0),
            fail_patient: Some(3),
        });
        let audit = create_shared_log();
        let mut scheduler = HeartbeatScheduler::new(
            Duration::from_millis(50),
            8,
            tx,
            sink.clone(),
            audit.clone(),
        );
        scheduler.start();

        // Collect one full sweep: all 8 sentinels arrive even though the
        // relay fails for patient 3.
        let mut seen = Vec::new();
        for _ in 0..8 {
            let reading: SensorReading = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(reading.is_heartbeat());
            seen.push(reading.patient_id);
        }
        scheduler.stop();

        assert_eq!(seen, (0..8).collect::<Vec<u32>>());
        assert_eq!(sink.relayed.load(Ordering::Relaxed), 7);
        assert!(audit.stats().heartbeats_sent >= 8);
    }

    #[test]
    fn test_stop_before_first_sweep() {
        let (tx, rx) = bounded(16);
        let sink = Arc::new(CountingSink {
            relayed: AtomicU64::new(0),
            fail_patient: None,
        });
        let mut scheduler = HeartbeatScheduler::new(
            Duration::from_secs(3600),
            4,
            tx,
            sink,
            create_shared_log(),
        );
        scheduler.start();
        scheduler.stop();
        assert!(rx.try_recv().is_err());
    }
}
