use std::io;
use thiserror::Error;

/// The primary error type for `gsbp-lib`'s host and device driving loops.
#[derive(Error, Debug)]
pub enum Error {
    #[error("device not connected")]
    NotConnectedToDevice,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("timeout waiting for response")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("no request found for id {0}")]
    NoRequestFound(u64),

    #[error("get_response timed out waiting for a reply")]
    GetResponseTimeout,

    #[error("invalid command id {0}")]
    InvalidCmd(u32),

    #[error("failed to open device: {0}")]
    OpeningDeviceFailed(String),

    #[error("node info was not received during connect")]
    NodeInfoNotReceived,

    #[error("device class mismatch: expected {expected}, got {actual}")]
    DeviceClassMismatch { expected: u8, actual: u8 },

    #[error("unrecognized command id {id}")]
    UnknownCmd { id: u32 },

    #[error(transparent)]
    Core(#[from] gsbp_core::Error),
}
