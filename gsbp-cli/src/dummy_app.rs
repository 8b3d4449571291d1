//! The reference example's application command ids and payload, entirely
//! out of scope for `gsbp-lib` itself (application-specific payload schemas
//! are this crate's concern, not the library's). Mirrored in
//! `gsbp-device-sim` so the two reference binaries speak the same demo
//! protocol.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const INIT_CMD: u16 = 200;
pub const START_CMD: u16 = 201;
pub const DATA_CMD: u16 = 202;
pub const DATA_ACK: u16 = 203;
pub const STOP_CMD: u16 = 204;
pub const DEINIT_CMD: u16 = 205;

/// One dummy ADC sample: a little-endian `i32`.
pub fn encode_sample(value: i32) -> Bytes {
    let mut out = BytesMut::with_capacity(4);
    out.put_i32_le(value);
    out.freeze()
}

pub fn decode_sample(mut payload: Bytes) -> Option<i32> {
    if payload.remaining() < 4 {
        return None;
    }
    Some(payload.get_i32_le())
}
