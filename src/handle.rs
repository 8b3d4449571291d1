//! Per-transport endpoint state.
//!
//! A [`Handle`] owns every buffer associated with one side of one transport
//! link: the staging area bytes land in as the transport delivers them, the
//! reassembly scratch space the [`crate::reassembler::Reassembler`] works
//! over, and the send buffer outgoing frames are built into.

use crate::descriptor::ProtocolDescriptor;
use bitflags::bitflags;

bitflags! {
    /// Handle state bits.
    ///
    /// `ENABLED` and `DISABLED` are tracked as two distinct bits rather than
    /// one boolean so that "never initialized" (`ENABLED` and `DISABLED`
    /// both clear) is distinguishable from "was enabled, then de-inited"
    /// (`DISABLED` set). Nothing else in this crate relies on that
    /// distinction today, but it mirrors the original firmware's state
    /// machine and keeps the door open for diagnostics that care about it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HandleState: u8 {
        const ENABLED            = 0b0000_0001;
        const DISABLED            = 0b0000_0010;
        const DEFAULT             = 0b0000_0100;
        const RECEIVE_ERROR       = 0b0000_1000;
        const USB_RESET_NEEDED    = 0b0001_0000;
        const AWAITING_MORE_DATA  = 0b0010_0000;
        const AWAITING_HEADER     = 0b0100_0000;
    }
}

/// What kind of transport backs a handle. Informational only at this layer
/// — the reassembler's input-driver behavior differs by kind only in how
/// bytes are *appended* to scratch, which is the caller's responsibility
/// (see [`crate::reassembler::Reassembler::append`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    UsbCdc,
    /// In-memory duplex pair, used by tests and the bundled device
    /// simulator.
    InMemory,
}

/// One transport endpoint's protocol-level state.
///
/// The staging/receive buffer that a transport writes bytes into is owned
/// by the caller (the transport driver); `Handle` owns only the reassembly
/// scratch buffer, which is protocol state rather than transport state.
#[derive(Debug, Clone)]
pub struct Handle {
    pub transport_id: u64,
    pub kind: TransportKind,
    pub descriptor: ProtocolDescriptor,
    state: HandleState,
    scratch: Vec<u8>,
    scratch_capacity: usize,
    /// Most recently received request id on this handle; used to answer
    /// "reuse the last received request id" (request id `0` on send).
    pub last_received_request_id: Option<u8>,
}

impl Handle {
    pub fn new(descriptor: ProtocolDescriptor, scratch_capacity: usize) -> Self {
        Handle {
            transport_id: 0,
            kind: TransportKind::Serial,
            descriptor,
            state: HandleState::empty(),
            scratch: Vec::with_capacity(scratch_capacity),
            scratch_capacity,
            last_received_request_id: None,
        }
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.contains(HandleState::ENABLED)
    }

    pub fn is_default(&self) -> bool {
        self.state.contains(HandleState::DEFAULT)
    }

    /// Registers the transport identity and marks the handle enabled. Does
    /// not clear previously-set bits other than `DISABLED` — the registry
    /// is what decides whether this call is even permitted (already-enabled
    /// / full-table rejection lives there, since it needs table-wide
    /// context).
    pub fn activate(&mut self, transport_id: u64, kind: TransportKind) {
        self.transport_id = transport_id;
        self.kind = kind;
        self.state.remove(HandleState::DISABLED);
        self.state.insert(HandleState::ENABLED);
    }

    pub fn deactivate(&mut self) {
        self.state.remove(HandleState::ENABLED | HandleState::DEFAULT);
        self.state.insert(HandleState::DISABLED);
        self.clear_buffer();
    }

    pub fn set_default(&mut self, is_default: bool) {
        self.state.set(HandleState::DEFAULT, is_default);
    }

    pub fn set_receive_error(&mut self, on: bool) {
        self.state.set(HandleState::RECEIVE_ERROR, on);
    }

    pub fn set_usb_reset_needed(&mut self, on: bool) {
        self.state.set(HandleState::USB_RESET_NEEDED, on);
    }

    pub fn set_awaiting_more_data(&mut self, on: bool) {
        self.state.set(HandleState::AWAITING_MORE_DATA, on);
    }

    pub fn is_awaiting_more_data(&self) -> bool {
        self.state.contains(HandleState::AWAITING_MORE_DATA)
    }

    /// Tracks the two-strikes count for an incomplete *header*, kept
    /// separate from [`Self::set_awaiting_more_data`] (which tracks an
    /// incomplete full frame) so a header that completes on the next read
    /// doesn't get charged a strike meant for a still-incomplete payload.
    pub fn set_awaiting_header(&mut self, on: bool) {
        self.state.set(HandleState::AWAITING_HEADER, on);
    }

    pub fn is_awaiting_header(&self) -> bool {
        self.state.contains(HandleState::AWAITING_HEADER)
    }

    pub fn clear_buffer(&mut self) {
        self.scratch.clear();
        self.state.remove(HandleState::AWAITING_MORE_DATA | HandleState::AWAITING_HEADER);
    }

    pub fn scratch(&self) -> &[u8] {
        &self.scratch
    }

    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch_capacity
    }

    /// Appends `incoming` to the scratch buffer. Copies as much as fits and
    /// returns `Err` if `incoming` had to be truncated; the caller is
    /// expected to emit a `BufferTooSmall` message to the peer in that
    /// case, per the protocol's error handling design.
    pub fn append_scratch(&mut self, incoming: &[u8]) -> Result<(), crate::error::Error> {
        let space = self.scratch_capacity.saturating_sub(self.scratch.len());
        if incoming.len() > space {
            self.scratch.extend_from_slice(&incoming[..space]);
            return Err(crate::error::Error::BufferTooSmall {
                needed: incoming.len(),
                capacity: self.scratch_capacity,
            });
        }
        self.scratch.extend_from_slice(incoming);
        Ok(())
    }

    /// Drops the first `n` bytes of scratch, shifting the remainder down.
    /// Used by the reassembler after extracting a package or discarding a
    /// corrupted prefix.
    pub fn consume_scratch(&mut self, n: usize) {
        if n >= self.scratch.len() {
            self.scratch.clear();
        } else {
            self.scratch.drain(..n);
        }
    }
}
