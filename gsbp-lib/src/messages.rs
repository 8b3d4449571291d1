//! Payloads for the protocol's universal sub-commands: node info, status,
//! universal ACK, and the message (debug/info/warning/error/critical-error)
//! stream.
//!
//! Field layouts are grounded on the original firmware's packed structs
//! (`gsbp_ACK_nodeInfo_t`, `gsbp_ACK_status_t`, `gsbp_ACK_universalACK_t`,
//! `gsbp_ACK_messageACK_t`) rather than re-derived, since exact field
//! widths are otherwise unspecified.

use crate::error::Error;
use crate::error_code::ErrorCode;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

/// Message severities, matching `gsbp_MsgTypes_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum Severity {
    #[num_enum(default)]
    Invalid = 0,
    #[strum(to_string = "critical error")]
    CriticalError = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Debug = 5,
}

/// Device identity and capability report, sent in reply to `NODE_INFO_CMD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub board_id: u64,
    pub device_class: u16,
    pub serial_number: u32,
    pub protocol_version: [u8; 2],
    pub firmware_version: [u8; 2],
    pub description: String,
}

impl NodeInfo {
    pub fn encode(&self) -> Bytes {
        let desc_bytes = self.description.as_bytes();
        let mut out = BytesMut::with_capacity(18 + desc_bytes.len());
        out.put_u64_le(self.board_id);
        out.put_u16_le(self.device_class);
        out.put_u32_le(self.serial_number);
        out.extend_from_slice(&self.protocol_version);
        out.extend_from_slice(&self.firmware_version);
        out.extend_from_slice(desc_bytes);
        out.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, Error> {
        if bytes.remaining() < 18 {
            return Err(Error::Core(gsbp_core::Error::InsufficientData {
                needed: 18 - bytes.remaining(),
            }));
        }
        let board_id = bytes.get_u64_le();
        let device_class = bytes.get_u16_le();
        let serial_number = bytes.get_u32_le();
        let mut protocol_version = [0u8; 2];
        bytes.copy_to_slice(&mut protocol_version);
        let mut firmware_version = [0u8; 2];
        bytes.copy_to_slice(&mut firmware_version);
        let description = decode_c_string(&bytes);
        Ok(NodeInfo {
            board_id,
            device_class,
            serial_number,
            protocol_version,
            firmware_version,
            description,
        })
    }
}

/// Device state/error snapshot, sent in reply to `STATUS_CMD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub error_code: ErrorCode,
    pub state: u8,
    pub message: String,
}

impl Status {
    pub fn encode(&self) -> Bytes {
        let msg_bytes = self.message.as_bytes();
        let mut out = BytesMut::with_capacity(3 + msg_bytes.len());
        out.put_u16_le(u8::from(self.error_code) as u16);
        out.put_u8(self.state);
        out.extend_from_slice(msg_bytes);
        out.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, Error> {
        if bytes.remaining() < 3 {
            return Err(Error::Core(gsbp_core::Error::InsufficientData {
                needed: 3 - bytes.remaining(),
            }));
        }
        let error_code = ErrorCode::from(bytes.get_u16_le() as u8);
        let state = bytes.get_u8();
        let message = decode_c_string(&bytes);
        Ok(Status {
            error_code,
            state,
            message,
        })
    }
}

/// Generic success/failure acknowledgment naming the command it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniversalAck {
    pub echoed_cmd: u16,
    pub success: bool,
}

impl UniversalAck {
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(3);
        out.put_u16_le(self.echoed_cmd);
        out.put_u8(self.success as u8);
        out.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, Error> {
        if bytes.remaining() < 3 {
            return Err(Error::Core(gsbp_core::Error::InsufficientData {
                needed: 3 - bytes.remaining(),
            }));
        }
        Ok(UniversalAck {
            echoed_cmd: bytes.get_u16_le(),
            success: bytes.get_u8() != 0,
        })
    }
}

/// A debug/info/warning/error/critical-error message from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAck {
    pub severity: Severity,
    pub state: u8,
    pub error_code: ErrorCode,
    pub text: String,
}

impl MessageAck {
    pub fn encode(&self) -> Bytes {
        let text_bytes = self.text.as_bytes();
        let mut out = BytesMut::with_capacity(4 + text_bytes.len());
        out.put_u8(self.severity.into());
        out.put_u8(self.state);
        out.put_u16_le(u8::from(self.error_code) as u16);
        out.extend_from_slice(text_bytes);
        out.freeze()
    }

    pub fn decode(mut bytes: Bytes) -> Result<Self, Error> {
        if bytes.remaining() < 4 {
            return Err(Error::Core(gsbp_core::Error::InsufficientData {
                needed: 4 - bytes.remaining(),
            }));
        }
        let severity = Severity::from(bytes.get_u8());
        let state = bytes.get_u8();
        let error_code = ErrorCode::from(bytes.get_u16_le() as u8);
        let text = decode_c_string(&bytes);
        Ok(MessageAck {
            severity,
            state,
            error_code,
            text,
        })
    }

    pub fn unknown_cmd(cmd_id: u32) -> Self {
        MessageAck {
            severity: Severity::CriticalError,
            state: 0,
            error_code: ErrorCode::UnknownCmd,
            text: format!("unknown CMD {cmd_id}"),
        }
    }
}

/// The original firmware null-terminates (or fixed-size-truncates) message
/// text with `vsnprintf`; this decodes a byte run up to the first `0x00` (or
/// the whole remaining payload if there isn't one) as UTF-8, lossily.
fn decode_c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_info_round_trip_matches_reference_scenario() {
        // literal reference values for an initial identify exchange.
        let info = NodeInfo {
            board_id: 0,
            device_class: 1,
            serial_number: 1_904_010_001,
            protocol_version: [0, 1],
            firmware_version: [0, 1],
            description: "gsbp-device-sim".to_string(),
        };
        let encoded = info.encode();
        let decoded = NodeInfo::decode(encoded).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn unknown_cmd_message_matches_reference_scenario() {
        // an unrecognized application command id, e.g. "unknown CMD 254".
        let msg = MessageAck::unknown_cmd(254);
        assert_eq!(msg.text, "unknown CMD 254");
        assert_eq!(msg.severity, Severity::CriticalError);
        let round = MessageAck::decode(msg.encode()).unwrap();
        assert_eq!(round, msg);
    }

    #[test]
    fn universal_ack_round_trips() {
        let ack = UniversalAck {
            echoed_cmd: 0x0A,
            success: true,
        };
        let round = UniversalAck::decode(ack.encode()).unwrap();
        assert_eq!(round, ack);
    }

    #[test]
    fn status_round_trips_with_message() {
        let status = Status {
            error_code: ErrorCode::NoError,
            state: 2,
            message: "idle".to_string(),
        };
        let round = Status::decode(status.encode()).unwrap();
        assert_eq!(round, status);
    }
}
