//! Host and device driving loops for GeneralSerialByteProtocol, built on
//! [`gsbp_core`]'s transport-agnostic framing primitives.
//!
//! [`host::GsbpHost`] owns the request/response correlation buffer and a
//! background reader task; [`device::GsbpDevice`] owns the command table
//! dispatch and one reader-and-responder task per attached link. Both sides
//! share the wire codec, error-code space, and universal message payloads
//! defined here.

pub mod commands;
pub mod config;
pub mod correlation;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod error_code;
pub mod host;
pub mod messages;
pub mod statistics;
pub mod transport;

pub use config::GsbpConfig;
pub use gsbp_core::Package;
pub use correlation::{CorrelationBuffer, UnsolicitedResponse};
pub use device::GsbpDevice;
pub use dispatcher::{DeviceCommands, DispatchOutcome, HostResponseKind, NoApplicationCommands, universal_ack};
pub use error::Error;
pub use error_code::ErrorCode;
pub use host::GsbpHost;
pub use messages::{MessageAck, NodeInfo, Severity, Status, UniversalAck};
pub use statistics::Statistics;
pub use transport::{in_memory_pair, open_serial};
