//! Outbound channel to the external inference pipeline.
//!
//! Finalized feature vectors and relayed heartbeats leave the controller as
//! Ethernet frames inside UDP datagrams aimed at the switch's packet-out
//! relay. Delivery is fire-and-forget: sends are bounded by a timeout,
//! failures are reported to the caller for logging, and nothing is retried.

use crate::codec::{FeatureFrame, SensorReading};
use std::net::SocketAddr;
use std::time::Duration;

/// Default bound on a single outbound send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Address of the switch packet-out relay.
    pub switch_addr: SocketAddr,
    /// Per-send timeout; one slow send must not stall a heartbeat sweep.
    pub send_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(switch_addr: SocketAddr) -> Self {
        Self {
            switch_addr,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Channel error types.
#[derive(Debug)]
pub enum ChannelError {
    /// Socket/runtime setup error.
    Config(String),
    /// Send failed.
    Network(String),
    /// Send did not complete within the configured timeout.
    Timeout,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Config(msg) => write!(f, "channel config error: {msg}"),
            ChannelError::Network(msg) => write!(f, "channel network error: {msg}"),
            ChannelError::Timeout => write!(f, "channel send timed out"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Where finalized windows and heartbeat relays go.
///
/// The production implementation is [`BlockingInferenceClient`]; tests use
/// recording sinks.
pub trait SubmitSink {
    fn submit_features(&self, frame: &FeatureFrame) -> Result<(), ChannelError>;
    fn relay_heartbeat(&self, reading: &SensorReading) -> Result<(), ChannelError>;
}

/// Async UDP client for the packet-out relay.
pub struct InferenceClient {
    config: ChannelConfig,
    socket: tokio::net::UdpSocket,
    instance_id: String,
}

impl InferenceClient {
    /// Bind a local ephemeral socket for sending toward the switch.
    pub async fn bind(config: ChannelConfig) -> Result<Self, ChannelError> {
        let socket = tokio::net::UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| ChannelError::Config(e.to_string()))?;

        // Instance ID from hostname + a short random suffix
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let instance_id = format!(
            "controller-{}-{}",
            host,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            socket,
            instance_id,
        })
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<(), ChannelError> {
        match tokio::time::timeout(
            self.config.send_timeout,
            self.socket.send_to(frame, self.config.switch_addr),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ChannelError::Network(e.to_string())),
            Err(_) => Err(ChannelError::Timeout),
        }
    }

    /// Submit a finalized feature vector.
    pub async fn submit_features(&self, frame: &FeatureFrame) -> Result<(), ChannelError> {
        self.send_frame(&frame.to_frame()).await
    }

    /// Relay one heartbeat frame toward the switch.
    pub async fn relay_heartbeat(&self, reading: &SensorReading) -> Result<(), ChannelError> {
        self.send_frame(&reading.to_frame()).await
    }

    /// Get the controller instance ID.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

/// Blocking client for use from the gate and heartbeat threads.
///
/// Owns a current-thread tokio runtime; `block_on` is safe to call from
/// multiple threads, so one client is shared behind an `Arc`. Concurrent
/// calls serialize through the single runtime rather than overlap, which is
/// acceptable for fire-and-forget datagram sends.
pub struct BlockingInferenceClient {
    inner: InferenceClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingInferenceClient {
    pub fn new(config: ChannelConfig) -> Result<Self, ChannelError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ChannelError::Config(format!("failed to create runtime: {e}")))?;
        let inner = runtime.block_on(InferenceClient::bind(config))?;
        Ok(Self { inner, runtime })
    }

    /// Get the controller instance ID.
    pub fn instance_id(&self) -> &str {
        self.inner.instance_id()
    }
}

impl SubmitSink for BlockingInferenceClient {
    fn submit_features(&self, frame: &FeatureFrame) -> Result<(), ChannelError> {
        self.runtime.block_on(self.inner.submit_features(frame))
    }

    fn relay_heartbeat(&self, reading: &SensorReading) -> Result<(), ChannelError> {
        self.runtime.block_on(self.inner.relay_heartbeat(reading))
    }
}
