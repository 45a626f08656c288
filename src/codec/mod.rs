//! Wire formats exchanged with the switch pipeline.
//!
//! Every datagram on the packet relay carries one Ethernet II frame. Three
//! payload formats ride on reserved ethertypes: sensor readings (0x1235),
//! inference requests (0x1234), and alert results (0x1236). All multi-byte
//! fields are network byte order.

pub mod alert;
pub mod feature;
pub mod frame;
pub mod sensor;

// Re-export commonly used types
pub use alert::{AlertFrame, SeverityLevel};
pub use feature::FeatureFrame;
pub use frame::{
    EtherHeader, MacAddr, CONTROLLER_MAC, ETHERTYPE_ALERT, ETHERTYPE_FEATURE, ETHERTYPE_SENSOR,
    SWITCH_MAC,
};
pub use sensor::{SensorReading, HEARTBEAT_SENSOR_ID};

/// Errors produced when decoding a frame or payload.
///
/// All of these are non-fatal: the caller drops the offending packet, counts
/// it, and keeps processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input shorter than the fixed-width layout requires.
    Truncated { needed: usize, got: usize },
    /// Frame carries an ethertype the decoder does not handle.
    UnexpectedEthertype(u16),
    /// Inference-request preamble or version/type bytes do not match.
    BadPreamble,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated { needed, got } => {
                write!(f, "truncated packet: need {needed} bytes, got {got}")
            }
            DecodeError::UnexpectedEthertype(et) => {
                write!(f, "unexpected ethertype 0x{et:04x}")
            }
            DecodeError::BadPreamble => write!(f, "bad inference frame preamble"),
        }
    }
}

impl std::error::Error for DecodeError {}
