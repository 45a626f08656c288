//! Sensor-reading wire format.
//!
//! One reading per frame: `patient_id` (u32), `sensor_id` (u32), a 48-bit
//! logical window timestamp, and the raw 16-bit feature value. Temperature
//! (sensor 0) arrives pre-scaled by 10 so the wire carries integers only.

use crate::codec::frame::{decode_u48, encode_u48, EtherHeader, ETHERTYPE_SENSOR};
use crate::codec::DecodeError;

/// Reserved `sensor_id` marking a heartbeat trigger rather than data.
pub const HEARTBEAT_SENSOR_ID: u32 = 999;

/// Payload length of a sensor-reading frame.
pub const SENSOR_PAYLOAD_LEN: usize = 16;

/// A single sensor reading (or heartbeat sentinel) from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    pub patient_id: u32,
    pub sensor_id: u32,
    /// Logical window timestamp (48 bits on the wire). Correlates results
    /// with the originating window; never used for aging.
    pub timestamp: u64,
    pub feature_value: u16,
}

impl SensorReading {
    /// Synthesize the zero-value heartbeat sentinel for a patient.
    pub fn heartbeat(patient_id: u32) -> Self {
        Self {
            patient_id,
            sensor_id: HEARTBEAT_SENSOR_ID,
            timestamp: 0,
            feature_value: 0,
        }
    }

    /// Whether this reading is the heartbeat sentinel.
    pub fn is_heartbeat(&self) -> bool {
        self.sensor_id == HEARTBEAT_SENSOR_ID
    }

    /// Encode the 16-byte payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SENSOR_PAYLOAD_LEN);
        buf.extend_from_slice(&self.patient_id.to_be_bytes());
        buf.extend_from_slice(&self.sensor_id.to_be_bytes());
        encode_u48(&mut buf, self.timestamp);
        buf.extend_from_slice(&self.feature_value.to_be_bytes());
        buf
    }

    /// Decode a 16-byte payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < SENSOR_PAYLOAD_LEN {
            return Err(DecodeError::Truncated {
                needed: SENSOR_PAYLOAD_LEN,
                got: payload.len(),
            });
        }
        Ok(Self {
            patient_id: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
            sensor_id: u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]),
            timestamp: decode_u48(&payload[8..14]),
            feature_value: u16::from_be_bytes([payload[14], payload[15]]),
        })
    }

    /// Encode as a full Ethernet frame addressed to the switch.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(14 + SENSOR_PAYLOAD_LEN);
        EtherHeader::outbound(ETHERTYPE_SENSOR).encode_into(&mut buf);
        buf.extend_from_slice(&self.encode());
        buf
    }

    /// Decode from a full Ethernet frame, checking the ethertype.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (header, payload) = EtherHeader::decode(bytes)?;
        if header.ethertype != ETHERTYPE_SENSOR {
            return Err(DecodeError::UnexpectedEthertype(header.ethertype));
        }
        Self::decode(payload)
    }
}
