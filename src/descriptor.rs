//! Protocol descriptor — the runtime object that parameterizes the wire
//! codec's variable-width fields.
//!
//! The original C implementation toggles these with preprocessor macros
//! (`GSBP__ENABLE_DESTINATION`, `GSBP__ENABLE_HEADER_CHECKSUM`, ...). A
//! systems-language rewrite models them as fields on an ordinary struct
//! instead, so the same binary can talk two differently-configured GSBP
//! links (e.g. a 1-byte-command debug UART and a 2-byte-command production
//! USB-CDC link) without a recompile.

pub const START_BYTE: u8 = 0x7E;
pub const END_BYTE: u8 = 0x81;

/// Width, in bytes, of a variable-width wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    One,
    Two,
}

impl FieldWidth {
    pub fn bytes(self) -> usize {
        match self {
            FieldWidth::One => 1,
            FieldWidth::Two => 2,
        }
    }
}

/// Describes the shape of every package on one GSBP link.
///
/// Constructed once per [`crate::handle::Handle`] (or shared across handles
/// that use an identical wire shape) and consulted by the codec on every
/// encode/decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    pub cmd_width: FieldWidth,
    pub size_width: FieldWidth,
    pub has_destination: bool,
    pub has_header_checksum: bool,
    pub has_data_checksum: bool,
    pub max_payload_len: usize,
}

impl ProtocolDescriptor {
    /// The reference configuration used by the literal byte scenarios in
    /// the protocol's conformance test suite: 1-byte command id, 2-byte
    /// size, no destination byte, no checksums.
    pub const fn reference() -> Self {
        ProtocolDescriptor {
            cmd_width: FieldWidth::One,
            size_width: FieldWidth::Two,
            has_destination: false,
            has_header_checksum: false,
            has_data_checksum: false,
            max_payload_len: 3000,
        }
    }

    /// A configuration with both checksums enabled, for links over noisy
    /// transports.
    pub const fn checksummed() -> Self {
        ProtocolDescriptor {
            has_header_checksum: true,
            has_data_checksum: true,
            ..Self::reference()
        }
    }

    /// Size of the header, in bytes, not counting the start sentinel:
    /// command id + optional destination + request id + size field +
    /// optional header checksum.
    pub fn header_len(&self) -> usize {
        self.cmd_width.bytes()
            + usize::from(self.has_destination)
            + 1 // request id
            + self.size_width.bytes()
            + usize::from(self.has_header_checksum)
    }

    /// Length of the data-checksum field on the wire (0 or 4 bytes; see
    /// [`crate::codec`] for why 4 bytes are reserved for an 8-bit value).
    pub fn data_checksum_len(&self) -> usize {
        if self.has_data_checksum { 4 } else { 0 }
    }

    /// Minimum possible framed size: header (after start byte) + end
    /// sentinel, for a zero-length payload.
    pub fn min_framed_len(&self) -> usize {
        1 + self.header_len() + self.data_checksum_len() + 1
    }
}

impl Default for ProtocolDescriptor {
    fn default() -> Self {
        Self::reference()
    }
}
