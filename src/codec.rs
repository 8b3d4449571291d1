//! Wire codec: turns a [`Package`] into bytes and back, parameterized by a
//! [`ProtocolDescriptor`] rather than compile-time feature flags.

use crate::descriptor::{END_BYTE, ProtocolDescriptor, START_BYTE};
use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A fully decoded GSBP package, independent of how it arrived on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub cmd_id: u16,
    pub destination: Option<u8>,
    pub request_id: u8,
    pub payload: Bytes,
}

impl Package {
    pub fn new(cmd_id: u16, request_id: u8, payload: Bytes) -> Self {
        Package {
            cmd_id,
            destination: None,
            request_id,
            payload,
        }
    }

    pub fn with_destination(mut self, destination: u8) -> Self {
        self.destination = Some(destination);
        self
    }
}

/// Header fields decoded from a slice that starts right after a confirmed
/// start sentinel, before the payload has necessarily fully arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub cmd_id: u16,
    pub destination: Option<u8>,
    pub request_id: u8,
    pub payload_len: usize,
    pub header_checksum_ok: bool,
}

/// XOR-folds `seed` with every byte in `bytes`, matching the original
/// firmware's running-XOR checksum.
fn xor_fold(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, &b| acc ^ b)
}

/// Computes the header checksum over `header_bytes` (the header, *not*
/// including the checksum byte itself, and *not* including the start
/// sentinel byte). The fold is seeded with the start-sentinel's own value —
/// this is deliberate, not a bug (see the design notes on this in
/// `DESIGN.md`): the reassembler only ever calls this with bytes that came
/// after a confirmed start sentinel, but the checksum still folds in the
/// sentinel's contribution via the seed.
pub fn header_checksum(header_bytes: &[u8]) -> u8 {
    xor_fold(START_BYTE, header_bytes)
}

/// Computes the data checksum over a payload. The wire field is 4 bytes
/// wide with the upper 3 bytes always zero (see [`data_checksum_field`]);
/// this function returns just the 8-bit result.
pub fn data_checksum(payload: &[u8]) -> u8 {
    xor_fold(0, payload)
}

/// Expands an 8-bit XOR checksum into the 4-byte little-endian wire field.
/// The upper three bytes are reserved for a future CRC-32 upgrade and are
/// always zero in this implementation.
fn data_checksum_field(payload: &[u8]) -> [u8; 4] {
    let mut field = [0u8; 4];
    field[0] = data_checksum(payload);
    field
}

/// Decodes the fixed-shape header fields from `bytes`, which must start
/// immediately after a confirmed start sentinel. Does not require the
/// payload to be present yet.
pub fn decode_header(desc: &ProtocolDescriptor, bytes: &[u8]) -> Result<HeaderFields, Error> {
    let header_len = desc.header_len();
    if bytes.len() < header_len {
        return Err(Error::InsufficientData {
            needed: header_len - bytes.len(),
        });
    }

    let mut buf = bytes;
    let cmd_id = match desc.cmd_width {
        crate::descriptor::FieldWidth::One => buf.get_u8() as u16,
        crate::descriptor::FieldWidth::Two => buf.get_u16_le(),
    };
    let destination = if desc.has_destination {
        Some(buf.get_u8())
    } else {
        None
    };
    let request_id = buf.get_u8();
    let payload_len = match desc.size_width {
        crate::descriptor::FieldWidth::One => buf.get_u8() as usize,
        crate::descriptor::FieldWidth::Two => buf.get_u16_le() as usize,
    };

    let header_checksum_ok = if desc.has_header_checksum {
        let stored = buf.get_u8();
        let preceding = &bytes[..header_len - 1];
        header_checksum(preceding) == stored
    } else {
        true
    };

    Ok(HeaderFields {
        cmd_id,
        destination,
        request_id,
        payload_len,
        header_checksum_ok,
    })
}

/// Total number of bytes a framed package occupies after the start
/// sentinel, given its header and declared payload length.
pub fn framed_len(desc: &ProtocolDescriptor, header: &HeaderFields) -> usize {
    desc.header_len() + header.payload_len + desc.data_checksum_len() + 1
}

/// Encodes `package` into a full wire frame (including start and end
/// sentinels) according to `desc`.
pub fn encode(desc: &ProtocolDescriptor, package: &Package) -> Result<Bytes, Error> {
    if package.payload.len() > desc.max_payload_len {
        return Err(Error::PayloadTooLarge {
            len: package.payload.len(),
            max: desc.max_payload_len,
        });
    }

    let mut out = BytesMut::with_capacity(desc.min_framed_len() + package.payload.len());
    out.put_u8(START_BYTE);

    let header_start = out.len();
    match desc.cmd_width {
        crate::descriptor::FieldWidth::One => out.put_u8(package.cmd_id as u8),
        crate::descriptor::FieldWidth::Two => out.put_u16_le(package.cmd_id),
    }
    if desc.has_destination {
        out.put_u8(package.destination.unwrap_or(0));
    }
    out.put_u8(package.request_id);
    match desc.size_width {
        crate::descriptor::FieldWidth::One => out.put_u8(package.payload.len() as u8),
        crate::descriptor::FieldWidth::Two => out.put_u16_le(package.payload.len() as u16),
    }
    if desc.has_header_checksum {
        let checksum = header_checksum(&out[header_start..]);
        out.put_u8(checksum);
    }

    out.extend_from_slice(&package.payload);

    if desc.has_data_checksum {
        out.extend_from_slice(&data_checksum_field(&package.payload));
    }

    out.put_u8(END_BYTE);
    Ok(out.freeze())
}

/// Verifies a standalone header checksum byte against the preceding header
/// bytes (excluding the start sentinel and the checksum byte itself).
pub fn verify_header_checksum(header_bytes_excl_checksum: &[u8], checksum: u8) -> bool {
    header_checksum(header_bytes_excl_checksum) == checksum
}

/// Verifies a 4-byte data-checksum field (as found on the wire) against a
/// payload.
pub fn verify_data_checksum(payload: &[u8], field: &[u8; 4]) -> bool {
    field[1] == 0 && field[2] == 0 && field[3] == 0 && field[0] == data_checksum(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ProtocolDescriptor;

    #[test]
    fn encode_reference_scenario_node_info_request() {
        // Host sends a node-info request: [7E 01 00 00 00 81].
        let desc = ProtocolDescriptor::reference();
        let pkg = Package::new(1, 0, Bytes::new());
        let encoded = encode(&desc, &pkg).unwrap();
        assert_eq!(encoded.as_ref(), &[0x7E, 0x01, 0x00, 0x00, 0x00, 0x81]);
    }

    #[test]
    fn encode_unknown_command_scenario() {
        let desc = ProtocolDescriptor::reference();
        let pkg = Package::new(0xFE, 0, Bytes::new());
        let encoded = encode(&desc, &pkg).unwrap();
        assert_eq!(encoded.as_ref(), &[0x7E, 0xFE, 0x00, 0x00, 0x00, 0x81]);
    }

    #[test]
    fn decode_header_reads_reference_shape() {
        let desc = ProtocolDescriptor::reference();
        let bytes = [0x01u8, 0x00, 0x00, 0x00]; // cmd, req_id, size_lo, size_hi
        let header = decode_header(&desc, &bytes).unwrap();
        assert_eq!(header.cmd_id, 1);
        assert_eq!(header.request_id, 0);
        assert_eq!(header.payload_len, 0);
        assert!(header.header_checksum_ok);
    }

    #[test]
    fn decode_header_insufficient_data() {
        let desc = ProtocolDescriptor::reference();
        let bytes = [0x01u8, 0x00];
        let err = decode_header(&desc, &bytes).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[test]
    fn round_trip_with_checksums_and_destination() {
        let desc = ProtocolDescriptor {
            has_destination: true,
            ..ProtocolDescriptor::checksummed()
        };
        let payload = Bytes::from_static(b"hello gsbp");
        let pkg = Package::new(200, 42, payload.clone()).with_destination(3);
        let encoded = encode(&desc, &pkg).unwrap();

        assert_eq!(encoded[0], START_BYTE);
        assert_eq!(*encoded.last().unwrap(), END_BYTE);

        let header = decode_header(&desc, &encoded[1..]).unwrap();
        assert_eq!(header.cmd_id, 200);
        assert_eq!(header.destination, Some(3));
        assert_eq!(header.request_id, 42);
        assert_eq!(header.payload_len, payload.len());
        assert!(header.header_checksum_ok);

        let total = framed_len(&desc, &header);
        assert_eq!(total + 1, encoded.len()); // +1 for the start sentinel
    }

    #[test]
    fn payload_too_large_rejected() {
        let desc = ProtocolDescriptor {
            max_payload_len: 4,
            ..ProtocolDescriptor::reference()
        };
        let pkg = Package::new(1, 1, Bytes::from_static(b"too long"));
        let err = encode(&desc, &pkg).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { .. }));
    }

    #[test]
    fn data_checksum_field_matches_verify() {
        let payload = b"\x00\x01\x02abc";
        let field = data_checksum_field(payload);
        assert!(verify_data_checksum(payload, &field));
        assert_eq!(field[1..], [0, 0, 0]);
    }
}
