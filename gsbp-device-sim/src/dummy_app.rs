//! The reference example's application command ids and payload. Mirrors
//! `gsbp-cli`'s copy so the two reference binaries speak the same demo
//! protocol; neither depends on the other, both depending only on the
//! shared `gsbp-lib` crate.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const INIT_CMD: u16 = 200;
pub const START_CMD: u16 = 201;
pub const DATA_CMD: u16 = 202;
pub const DATA_ACK: u16 = 203;
pub const STOP_CMD: u16 = 204;
pub const DEINIT_CMD: u16 = 205;

pub fn encode_sample(value: i32) -> Bytes {
    let mut out = BytesMut::with_capacity(4);
    out.put_i32_le(value);
    out.freeze()
}

#[allow(dead_code)]
pub fn decode_sample(mut payload: Bytes) -> Option<i32> {
    if payload.remaining() < 4 {
        return None;
    }
    Some(payload.get_i32_le())
}
