//! Inbound packet relay listener.
//!
//! A background thread receives UDP datagrams (each one Ethernet frame
//! punted by the switch), decodes sensor readings, and forwards them over a
//! bounded channel to the gate loop. Malformed datagrams are dropped,
//! counted, and logged; the listener never stops over bad input.

use crate::audit::SharedAuditLog;
use crate::codec::SensorReading;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Socket read timeout; bounds how long stop() waits for the thread.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors that can occur while starting the listener.
#[derive(Debug)]
pub enum ListenerError {
    AlreadyRunning,
    Bind(String),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::AlreadyRunning => write!(f, "listener is already running"),
            ListenerError::Bind(e) => write!(f, "failed to bind ingest socket: {e}"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Receives sensor-reading frames and feeds the ingest channel.
pub struct PacketListener {
    addr: SocketAddr,
    sender: Sender<SensorReading>,
    receiver: Receiver<SensorReading>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PacketListener {
    pub fn new(addr: SocketAddr) -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            addr,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Channel end the heartbeat scheduler injects sentinel readings into,
    /// so heartbeats travel the same ingestion path as real readings.
    pub fn sender(&self) -> Sender<SensorReading> {
        self.sender.clone()
    }

    /// Get the receiver for ingested readings.
    pub fn receiver(&self) -> &Receiver<SensorReading> {
        &self.receiver
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the socket and start the receive thread.
    pub fn start(&mut self, audit: SharedAuditLog) -> Result<(), ListenerError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }
        let socket = UdpSocket::bind(self.addr).map_err(|e| ListenerError::Bind(e.to_string()))?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|e| ListenerError::Bind(e.to_string()))?;
        self.addr = socket.local_addr().map_err(|e| ListenerError::Bind(e.to_string()))?;

        info!("listening for sensor frames on {}", self.addr);
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let sender = self.sender.clone();

        self.handle = Some(thread::spawn(move || {
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
                    Err(e) => {
                        debug!("ingest socket error: {e}");
                        continue;
                    }
                };
                match SensorReading::from_frame(&buf[..n]) {
                    Ok(reading) => {
                        if sender.send(reading).is_err() {
                            // Gate loop is gone; shut the thread down.
                            break;
                        }
                    }
                    Err(e) => {
                        audit.record_malformed();
                        debug!("dropping malformed packet: {e}");
                    }
                }
            }
        }));
        Ok(())
    }

    /// Stop the receive thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the listener is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PacketListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::create_shared_log;

    #[test]
    fn test_decodes_frames_and_counts_malformed() {
        let audit = create_shared_log();
        let mut listener = PacketListener::new("127.0.0.1:0".parse().unwrap());
        listener.start(audit.clone()).unwrap();
        let target = listener.local_addr();

        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        let reading = SensorReading {
            patient_id: 12,
            sensor_id: 4,
            timestamp: 500,
            feature_value: 16,
        };
        tx.send_to(&reading.to_frame(), target).unwrap();
        tx.send_to(b"garbage", target).unwrap();

        let received = listener
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(received, reading);

        // The garbage datagram never reaches the channel.
        assert!(listener
            .receiver()
            .recv_timeout(Duration::from_millis(300))
            .is_err());
        assert_eq!(audit.stats().malformed_dropped, 1);

        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_start_twice_fails() {
        let mut listener = PacketListener::new("127.0.0.1:0".parse().unwrap());
        listener.start(create_shared_log()).unwrap();
        assert!(matches!(
            listener.start(create_shared_log()),
            Err(ListenerError::AlreadyRunning)
        ));
    }
}
