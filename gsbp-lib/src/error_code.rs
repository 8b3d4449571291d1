//! The protocol's reserved error-code space: values `0..32` are
//! reserved for the protocol itself, application-defined codes start at
//! `32`. Carried inside `Status` and `MessageAck` payloads, not to be
//! confused with [`crate::error::Error`], which is this crate's own Rust
//! error type for operations that can fail locally (timeouts, I/O, ...).

use num_enum::{FromPrimitive, IntoPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum ErrorCode {
    NoError = 0,
    UnknownCmd = 1,
    ChecksumMismatch = 2,
    EndByteMismatch = 3,
    UartSizeMismatch = 4,
    BufferTooSmall = 5,
    DeviceClassInvalid = 6,
    CmdNotValidNow = 7,
    CmdNotExpected = 8,
    StateUnknown = 9,
    NoNewData = 10,
    NotConnectedToDevice = 11,
    InvalidCmd = 12,
    NoRequestFound = 13,
    GetResponseTimeout = 14,
    OpeningDeviceFailed = 15,
    NodeInfoNotReceived = 16,
    DeviceClassMismatch = 17,
    #[num_enum(catch_all)]
    Application(u8),
}
