//! Turns a handle's reassembly scratch buffer into discrete packages.
//!
//! This is the most intricate component of the protocol: it must tolerate
//! partial reads (retrying once more bytes arrive), desynchronized streams
//! (resynchronizing on the next start sentinel), and corrupted headers
//! (masking the bad frame rather than wedging forever), all while never
//! growing scratch past its configured capacity.

use crate::codec::{Package, decode_header, framed_len};
use crate::descriptor::{END_BYTE, START_BYTE};
use crate::handle::Handle;
use bytes::Bytes;

/// What happened on one [`build_package`] attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblerOutcome {
    /// A complete, validated package was extracted.
    Framed(Package),
    /// Not enough bytes yet for a complete frame; this is the first such
    /// observation since the last successful frame or reset. The caller
    /// should retry after more bytes arrive.
    AwaitingMoreData,
    /// A second consecutive insufficient-data observation: scratch has
    /// been reset and the caller should treat this as "no new data this
    /// tick", per the protocol's two-strikes rule.
    NoNewData,
    /// No start sentinel was found anywhere in scratch; `discarded` bytes
    /// were dropped.
    NoStartSentinel { discarded: usize },
    /// The header checksum did not match; the offending start sentinel was
    /// masked so the next call resumes scanning past it.
    ChecksumMismatch { discarded: usize },
    /// The end sentinel was not where the header's declared size said it
    /// would be; the header region was discarded so the next call resumes
    /// scanning past it.
    EndByteMismatch { discarded: usize },
}

/// Attempts to extract one framed package from `handle`'s scratch buffer.
///
/// A single call performs at most one pass of the extraction algorithm: on
/// any non-[`ReassemblerOutcome::Framed`] outcome other than
/// [`ReassemblerOutcome::AwaitingMoreData`]/[`ReassemblerOutcome::NoNewData`],
/// callers that want to keep draining the same tick's bytes should call
/// `build_package` again — bytes past the discarded prefix may still
/// contain a valid frame.
pub fn build_package(handle: &mut Handle) -> ReassemblerOutcome {
    let desc = handle.descriptor;

    // Step 1: scan for the start sentinel.
    let start_idx = handle.scratch().iter().position(|&b| b == START_BYTE);
    let Some(start_idx) = start_idx else {
        let discarded = handle.scratch_len();
        handle.clear_buffer();
        return ReassemblerOutcome::NoStartSentinel { discarded };
    };
    if start_idx > 0 {
        handle.consume_scratch(start_idx);
    }

    let header_len = desc.header_len();
    let available_after_start = handle.scratch_len().saturating_sub(1);
    if available_after_start < header_len {
        return awaiting_header(handle);
    }
    handle.set_awaiting_header(false);

    let header = {
        let after_start = &handle.scratch()[1..];
        decode_header(&desc, after_start).expect("length already checked above")
    };

    // Step 2: header checksum.
    if desc.has_header_checksum && !header.header_checksum_ok {
        handle.consume_scratch(1);
        return ReassemblerOutcome::ChecksumMismatch { discarded: 1 };
    }

    // Step 3: is the whole frame present yet?
    let total_after_start = framed_len(&desc, &header);
    if available_after_start < total_after_start {
        return awaiting_more_data(handle);
    }

    // Step 4: end sentinel.
    let end_ok = handle.scratch()[1..][total_after_start - 1] == END_BYTE;
    if !end_ok {
        let discarded = 1 + header_len;
        handle.consume_scratch(discarded);
        return ReassemblerOutcome::EndByteMismatch { discarded };
    }

    // Step 5/6: extract the payload and record the request id.
    let payload_start = header_len;
    let payload_end = payload_start + header.payload_len;
    let payload = {
        let after_start = &handle.scratch()[1..];
        Bytes::copy_from_slice(&after_start[payload_start..payload_end])
    };

    let mut package = Package::new(header.cmd_id, header.request_id, payload);
    if let Some(dest) = header.destination {
        package = package.with_destination(dest);
    }

    handle.last_received_request_id = Some(header.request_id);

    // Step 7: consume exactly this frame, leaving any trailing bytes (the
    // start of the next frame, or garbage) in scratch for the next call.
    handle.consume_scratch(1 + total_after_start);
    handle.set_awaiting_more_data(false);

    ReassemblerOutcome::Framed(package)
}

fn awaiting_more_data(handle: &mut Handle) -> ReassemblerOutcome {
    if handle.is_awaiting_more_data() {
        handle.clear_buffer();
        ReassemblerOutcome::NoNewData
    } else {
        handle.set_awaiting_more_data(true);
        ReassemblerOutcome::AwaitingMoreData
    }
}

/// Two-strikes for an incomplete header, tracked separately from
/// [`awaiting_more_data`]'s full-frame strike: a frame that arrives
/// header-first and payload-second should only ever trip the payload
/// strike, not this one too.
fn awaiting_header(handle: &mut Handle) -> ReassemblerOutcome {
    if handle.is_awaiting_header() {
        handle.clear_buffer();
        ReassemblerOutcome::NoNewData
    } else {
        handle.set_awaiting_header(true);
        ReassemblerOutcome::AwaitingMoreData
    }
}

/// Drains every complete package currently extractable from `handle`,
/// stopping at the first non-`Framed` outcome. Convenience wrapper around
/// repeated [`build_package`] calls for the common "drain this tick's
/// bytes" driver loop.
pub fn drain(handle: &mut Handle) -> (Vec<Package>, Option<ReassemblerOutcome>) {
    let mut packages = Vec::new();
    loop {
        match build_package(handle) {
            ReassemblerOutcome::Framed(pkg) => packages.push(pkg),
            other => return (packages, Some(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ProtocolDescriptor;
    use crate::handle::TransportKind;

    fn handle_with(bytes: &[u8]) -> Handle {
        let mut h = Handle::new(ProtocolDescriptor::reference(), 256);
        h.activate(1, TransportKind::Serial);
        h.append_scratch(bytes).unwrap();
        h
    }

    #[test]
    fn extracts_node_info_request_scenario() {
        let mut h = handle_with(&[0x7E, 0x01, 0x00, 0x00, 0x00, 0x81]);
        let outcome = build_package(&mut h);
        match outcome {
            ReassemblerOutcome::Framed(pkg) => {
                assert_eq!(pkg.cmd_id, 1);
                assert_eq!(pkg.request_id, 0);
                assert!(pkg.payload.is_empty());
            }
            other => panic!("expected Framed, got {other:?}"),
        }
        assert_eq!(h.scratch_len(), 0);
    }

    #[test]
    fn framing_recovery_scenario() {
        // Leading/trailing junk around one valid frame.
        let mut h = handle_with(&[0xAA, 0xBB, 0x7E, 0x05, 0x00, 0x00, 0x00, 0x81, 0xCC]);
        let outcome = build_package(&mut h);
        match outcome {
            ReassemblerOutcome::Framed(pkg) => assert_eq!(pkg.cmd_id, 5),
            other => panic!("expected Framed, got {other:?}"),
        }
        // trailing 0xCC remains in scratch for the next scan.
        assert_eq!(h.scratch(), &[0xCC]);
    }

    #[test]
    fn no_start_sentinel_discards_everything() {
        let mut h = handle_with(&[0x01, 0x02, 0x03]);
        let outcome = build_package(&mut h);
        assert_eq!(outcome, ReassemblerOutcome::NoStartSentinel { discarded: 3 });
        assert_eq!(h.scratch_len(), 0);
    }

    #[test]
    fn awaiting_header_then_no_new_data_on_second_strike() {
        let mut h = handle_with(&[0x7E, 0x01]); // header incomplete
        assert_eq!(build_package(&mut h), ReassemblerOutcome::AwaitingMoreData);
        assert!(h.is_awaiting_header());
        // no new bytes arrive before the next poll.
        assert_eq!(build_package(&mut h), ReassemblerOutcome::NoNewData);
        assert_eq!(h.scratch_len(), 0);
        assert!(!h.is_awaiting_header());
    }

    #[test]
    fn awaiting_payload_then_no_new_data_on_second_strike() {
        let mut h = handle_with(&[0x7E, 0x01, 0x00, 0x00]); // header complete, payload/end incomplete
        assert_eq!(build_package(&mut h), ReassemblerOutcome::AwaitingMoreData);
        assert!(h.is_awaiting_more_data());
        assert_eq!(build_package(&mut h), ReassemblerOutcome::NoNewData);
        assert_eq!(h.scratch_len(), 0);
        assert!(!h.is_awaiting_more_data());
    }

    #[test]
    fn header_then_payload_arriving_on_separate_ticks_does_not_trip_two_strikes() {
        // Header-incomplete on the first call, payload-incomplete on the
        // second (header declares a 1-byte payload): these are two
        // different strike counters, so this must not escalate to
        // `NoNewData` and clear the still-arriving frame.
        let mut h = handle_with(&[0x7E, 0x01]);
        assert_eq!(build_package(&mut h), ReassemblerOutcome::AwaitingMoreData);
        assert!(h.is_awaiting_header());

        h.append_scratch(&[0x00, 0x01, 0x00]).unwrap(); // completes the header, payload_len=1
        assert_eq!(build_package(&mut h), ReassemblerOutcome::AwaitingMoreData);
        assert!(!h.is_awaiting_header());
        assert!(h.is_awaiting_more_data());

        h.append_scratch(&[0xAB, 0x81]).unwrap();
        match build_package(&mut h) {
            ReassemblerOutcome::Framed(pkg) => {
                assert_eq!(pkg.cmd_id, 1);
                assert_eq!(&pkg.payload[..], &[0xAB]);
            }
            other => panic!("expected Framed, got {other:?}"),
        }
    }

    #[test]
    fn partial_frame_completes_once_more_bytes_arrive() {
        let mut h = handle_with(&[0x7E, 0x01, 0x00, 0x00]);
        assert_eq!(build_package(&mut h), ReassemblerOutcome::AwaitingMoreData);
        h.append_scratch(&[0x00, 0x81]).unwrap();
        match build_package(&mut h) {
            ReassemblerOutcome::Framed(pkg) => assert_eq!(pkg.cmd_id, 1),
            other => panic!("expected Framed, got {other:?}"),
        }
    }

    #[test]
    fn end_byte_mismatch_discards_header_and_resyncs() {
        // Declares payload_len=0 but the byte right after the header is not 0x81;
        // a valid frame starts right after the bogus one.
        let mut bytes = vec![0x7E, 0x01, 0x00, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x7E, 0x02, 0x00, 0x00, 0x00, 0x81]);
        let mut h = handle_with(&bytes);

        let outcome = build_package(&mut h);
        assert!(matches!(outcome, ReassemblerOutcome::EndByteMismatch { .. }));

        match build_package(&mut h) {
            ReassemblerOutcome::Framed(pkg) => assert_eq!(pkg.cmd_id, 2),
            other => panic!("expected Framed, got {other:?}"),
        }
    }

    #[test]
    fn checksum_mismatch_masks_and_resyncs() {
        let desc = ProtocolDescriptor::checksummed();
        let mut h = Handle::new(desc, 256);
        h.activate(1, TransportKind::Serial);

        let good =
            crate::codec::encode(&desc, &Package::new(5, 1, Bytes::from_static(b"ok"))).unwrap();
        // corrupt the checksum byte of a first, bogus frame, then append a real one.
        let mut bogus = good.to_vec();
        let checksum_idx = desc.header_len(); // header_len includes the checksum byte itself
        bogus[checksum_idx] ^= 0xFF;

        let mut stream = bogus.clone();
        stream.extend_from_slice(&good);
        h.append_scratch(&stream).unwrap();

        let outcome = build_package(&mut h);
        assert!(matches!(outcome, ReassemblerOutcome::ChecksumMismatch { .. }));

        match build_package(&mut h) {
            ReassemblerOutcome::Framed(pkg) => assert_eq!(pkg.cmd_id, 5),
            other => panic!("expected Framed, got {other:?}"),
        }
    }

    #[test]
    fn scratch_never_exceeds_capacity() {
        let mut h = Handle::new(ProtocolDescriptor::reference(), 8);
        h.activate(1, TransportKind::Serial);
        let err = h.append_scratch(&[0u8; 20]);
        assert!(err.is_err());
        assert!(h.scratch_len() <= h.scratch_capacity());
    }

    #[test]
    fn drain_extracts_all_back_to_back_frames() {
        let desc = ProtocolDescriptor::reference();
        let mut h = Handle::new(desc, 256);
        h.activate(1, TransportKind::Serial);
        let a = crate::codec::encode(&desc, &Package::new(1, 1, Bytes::new())).unwrap();
        let b = crate::codec::encode(&desc, &Package::new(2, 2, Bytes::new())).unwrap();
        let mut stream = a.to_vec();
        stream.extend_from_slice(&b);
        h.append_scratch(&stream).unwrap();

        let (packages, last) = drain(&mut h);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].cmd_id, 1);
        assert_eq!(packages[1].cmd_id, 2);
        assert!(matches!(last, Some(ReassemblerOutcome::NoStartSentinel { discarded: 0 })));
    }
}
