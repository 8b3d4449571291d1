//! Core framing primitives for GeneralSerialByteProtocol (GSBP): the wire
//! codec, handle and handle-registry bookkeeping, and the byte-stream
//! reassembler.
//!
//! This crate is transport- and application-agnostic: it has no notion of
//! serial ports, sockets, or what a command id *means*. `gsbp-lib` builds
//! the host-side correlation buffer and the device-side dispatcher on top
//! of these primitives.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod reassembler;
pub mod registry;

pub use codec::Package;
pub use descriptor::ProtocolDescriptor;
pub use error::Error;
pub use handle::{Handle, HandleState, TransportKind};
pub use reassembler::{ReassemblerOutcome, build_package, drain};
pub use registry::HandleRegistry;
