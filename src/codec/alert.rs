//! Alert/result wire format.
//!
//! Emitted by the switch pipeline once inference completes: the sepsis
//! prediction (condition A), the NEWS2 severity score and alert level, and
//! the heart-failure prediction (condition B). The controller core never
//! consumes these; watch mode decodes them for the alert log.

use crate::codec::frame::{decode_u48, encode_u48, EtherHeader, ETHERTYPE_ALERT};
use crate::codec::DecodeError;

/// Payload length of an alert frame.
pub const ALERT_PAYLOAD_LEN: usize = 4 + 6 + 4 + 1 + 1 + 4;

/// Severity alert level carried in an alert frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Unknown(u8),
}

impl SeverityLevel {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => SeverityLevel::Low,
            1 => SeverityLevel::Medium,
            2 => SeverityLevel::High,
            other => SeverityLevel::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            SeverityLevel::Low => 0,
            SeverityLevel::Medium => 1,
            SeverityLevel::High => 2,
            SeverityLevel::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityLevel::Low => write!(f, "Low (0)"),
            SeverityLevel::Medium => write!(f, "Medium (1)"),
            SeverityLevel::High => write!(f, "High (2)"),
            SeverityLevel::Unknown(v) => write!(f, "Unknown ({v})"),
        }
    }
}

/// An inference result punted back from the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertFrame {
    pub patient_id: u32,
    /// Window timestamp echoed from the originating feature vector.
    pub timestamp: u64,
    /// Condition-A (sepsis) prediction.
    pub condition_a: u32,
    /// Severity score (NEWS2).
    pub severity_score: u8,
    /// Severity alert level.
    pub severity_alert: SeverityLevel,
    /// Condition-B (heart failure) prediction.
    pub condition_b: u32,
}

impl AlertFrame {
    /// Encode the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ALERT_PAYLOAD_LEN);
        buf.extend_from_slice(&self.patient_id.to_be_bytes());
        encode_u48(&mut buf, self.timestamp);
        buf.extend_from_slice(&self.condition_a.to_be_bytes());
        buf.push(self.severity_score);
        buf.push(self.severity_alert.to_wire());
        buf.extend_from_slice(&self.condition_b.to_be_bytes());
        buf
    }

    /// Decode a payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < ALERT_PAYLOAD_LEN {
            return Err(DecodeError::Truncated {
                needed: ALERT_PAYLOAD_LEN,
                got: payload.len(),
            });
        }
        Ok(Self {
            patient_id: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
            timestamp: decode_u48(&payload[4..10]),
            condition_a: u32::from_be_bytes([payload[10], payload[11], payload[12], payload[13]]),
            severity_score: payload[14],
            severity_alert: SeverityLevel::from_wire(payload[15]),
            condition_b: u32::from_be_bytes([payload[16], payload[17], payload[18], payload[19]]),
        })
    }

    /// Encode as a full Ethernet frame.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(14 + ALERT_PAYLOAD_LEN);
        EtherHeader::outbound(ETHERTYPE_ALERT).encode_into(&mut buf);
        buf.extend_from_slice(&self.encode());
        buf
    }

    /// Decode from a full Ethernet frame, checking the ethertype.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (header, payload) = EtherHeader::decode(bytes)?;
        if header.ethertype != ETHERTYPE_ALERT {
            return Err(DecodeError::UnexpectedEthertype(header.ethertype));
        }
        Self::decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_roundtrip() {
        let alert = AlertFrame {
            patient_id: 17,
            timestamp: 123_456,
            condition_a: 1,
            severity_score: 7,
            severity_alert: SeverityLevel::High,
            condition_b: 0,
        };
        let decoded = AlertFrame::from_frame(&alert.to_frame()).unwrap();
        assert_eq!(decoded, alert);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(SeverityLevel::from_wire(0), SeverityLevel::Low);
        assert_eq!(SeverityLevel::from_wire(1), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_wire(2), SeverityLevel::High);
        assert_eq!(SeverityLevel::from_wire(9), SeverityLevel::Unknown(9));
        assert_eq!(SeverityLevel::Unknown(9).to_wire(), 9);
    }
}
