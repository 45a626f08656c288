//! Inference-request wire format.
//!
//! The finalized feature vector handed to the switch pipeline: a two-byte
//! "P4" preamble, version and type bytes, `patient_id`, the 48-bit window
//! timestamp, ten 16-bit feature values in slot order, and a 32-bit result
//! word the switch fills on the return path (the controller sends 0).

use crate::codec::frame::{decode_u48, encode_u48, EtherHeader, ETHERTYPE_FEATURE};
use crate::codec::DecodeError;
use crate::NUM_SENSORS;

/// Two-byte preamble opening every inference frame.
pub const FEATURE_PREAMBLE: [u8; 2] = *b"P4";
/// Protocol version byte.
pub const FEATURE_VERSION: u8 = 0x01;
/// Message type byte.
pub const FEATURE_TYPE: u8 = 0x01;

/// Payload length: preamble + version + type + id + u48 + 10 values + result.
pub const FEATURE_PAYLOAD_LEN: usize = 4 + 4 + 6 + 2 * NUM_SENSORS + 4;

/// A finalized feature vector bound for the inference pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFrame {
    pub patient_id: u32,
    pub timestamp: u64,
    pub features: [u16; NUM_SENSORS],
    pub result: u32,
}

impl FeatureFrame {
    /// Build a request frame for a finalized window; `result` starts at 0.
    pub fn request(patient_id: u32, timestamp: u64, features: [u16; NUM_SENSORS]) -> Self {
        Self {
            patient_id,
            timestamp,
            features,
            result: 0,
        }
    }

    /// Encode the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FEATURE_PAYLOAD_LEN);
        buf.extend_from_slice(&FEATURE_PREAMBLE);
        buf.push(FEATURE_VERSION);
        buf.push(FEATURE_TYPE);
        buf.extend_from_slice(&self.patient_id.to_be_bytes());
        encode_u48(&mut buf, self.timestamp);
        for value in &self.features {
            buf.extend_from_slice(&value.to_be_bytes());
        }
        buf.extend_from_slice(&self.result.to_be_bytes());
        buf
    }

    /// Decode a payload, validating preamble, version, and type bytes.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < FEATURE_PAYLOAD_LEN {
            return Err(DecodeError::Truncated {
                needed: FEATURE_PAYLOAD_LEN,
                got: payload.len(),
            });
        }
        if payload[0..2] != FEATURE_PREAMBLE
            || payload[2] != FEATURE_VERSION
            || payload[3] != FEATURE_TYPE
        {
            return Err(DecodeError::BadPreamble);
        }
        let patient_id = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let timestamp = decode_u48(&payload[8..14]);
        let mut features = [0u16; NUM_SENSORS];
        for (i, value) in features.iter_mut().enumerate() {
            let off = 14 + 2 * i;
            *value = u16::from_be_bytes([payload[off], payload[off + 1]]);
        }
        let off = 14 + 2 * NUM_SENSORS;
        let result = u32::from_be_bytes([
            payload[off],
            payload[off + 1],
            payload[off + 2],
            payload[off + 3],
        ]);
        Ok(Self {
            patient_id,
            timestamp,
            features,
            result,
        })
    }

    /// Encode as a full Ethernet frame addressed to the switch.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(14 + FEATURE_PAYLOAD_LEN);
        EtherHeader::outbound(ETHERTYPE_FEATURE).encode_into(&mut buf);
        buf.extend_from_slice(&self.encode());
        buf
    }

    /// Decode from a full Ethernet frame, checking the ethertype.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (header, payload) = EtherHeader::decode(bytes)?;
        if header.ethertype != ETHERTYPE_FEATURE {
            return Err(DecodeError::UnexpectedEthertype(header.ethertype));
        }
        Self::decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let frame = FeatureFrame::request(7, 99, [370, 95, 80, 120, 16, 2, 1, 1, 64, 0]);
        let decoded = FeatureFrame::from_frame(&frame.to_frame()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.result, 0);
    }

    #[test]
    fn test_bad_preamble_rejected() {
        let mut payload = FeatureFrame::request(1, 1, [0; NUM_SENSORS]).encode();
        payload[0] = b'X';
        assert_eq!(
            FeatureFrame::decode(&payload).unwrap_err(),
            DecodeError::BadPreamble
        );
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut payload = FeatureFrame::request(1, 1, [0; NUM_SENSORS]).encode();
        payload[2] = 0x02;
        assert_eq!(
            FeatureFrame::decode(&payload).unwrap_err(),
            DecodeError::BadPreamble
        );
    }
}
