use thiserror::Error;

/// Errors raised by the wire codec, handle registry and reassembler.
///
/// This is the "local" error type for the framing primitives in this crate;
/// `gsbp-lib` wraps it into its own error type for the transport and
/// correlation layers built on top.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("payload of {len} bytes exceeds the configured maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("header checksum mismatch")]
    ChecksumMismatch,

    #[error("end sentinel mismatch")]
    EndByteMismatch,

    #[error("buffer too small to hold {needed} bytes (capacity {capacity})")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("insufficient data: need at least {needed} more bytes")]
    InsufficientData { needed: usize },

    #[error("handle table is full (max {max})")]
    RegistryFull { max: usize },

    #[error("handle registry is empty")]
    RegistryEmpty,

    #[error("handle index {0} is not registered")]
    HandleNotFound(usize),

    #[error("handle index {0} is not enabled")]
    HandleNotEnabled(usize),

    #[error("handle index {0} is already enabled")]
    HandleAlreadyEnabled(usize),
}
