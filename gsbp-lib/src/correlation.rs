//! The host-side request/response correlation buffer.
//!
//! A fixed-capacity ring of request/response pairs, newest at the front,
//! guarded by a single mutex. Modeled on the original firmware's
//! `RequestResponse_t` / `boost::circular_buffer<RequestResponse_t>` and
//! its `SendPackage`/`GetResponse`/`AddResponse` routines.

use crate::commands::MESSAGE_ACK;
use crate::error::Error;
use crate::error_code::ErrorCode;
use crate::messages::{MessageAck, Severity};
use gsbp_core::Package;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default ring capacity, matching the original's `gsbp_RequestResponceBufferSize`.
pub const DEFAULT_CAPACITY: usize = 500;

/// Default per-poll sleep while waiting for a response, matching the
/// original's busy-poll-with-sleep `GetResponse` loop.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct RequestResponseEntry {
    pub local_id: u8,
    pub global_id: u64,
    pub sent: Package,
    pub response: Option<Package>,
    pub is_dummy: bool,
    pub response_received: bool,
    pub timed_out: bool,
    pub error_code: Option<ErrorCode>,
    pub error_description: Option<String>,
    pub sent_at: Instant,
    pub received_at: Option<Instant>,
}

impl RequestResponseEntry {
    fn new(local_id: u8, global_id: u64, sent: Package) -> Self {
        RequestResponseEntry {
            local_id,
            global_id,
            sent,
            response: None,
            is_dummy: false,
            response_received: false,
            timed_out: false,
            error_code: None,
            error_description: None,
            sent_at: Instant::now(),
            received_at: None,
        }
    }

    /// A "consumed" entry has its ids zeroed, so claimed entries no
    /// longer match future `local_id` scans or `global_id` lookups.
    fn is_consumed(&self) -> bool {
        self.local_id == 0 && self.global_id == 0
    }

    fn consume(&mut self) {
        self.local_id = 0;
        self.global_id = 0;
    }
}

/// What the caller of [`CorrelationBuffer::add_response`] should do with a
/// freshly-landed response that nobody is waiting on right now.
#[derive(Debug, Clone)]
pub enum UnsolicitedResponse {
    /// A severity-classified message; `owning_global_id` is `0` if the
    /// local id did not match any outstanding entry.
    Message {
        message: MessageAck,
        owning_global_id: u64,
    },
    /// Any other response the buffer stored but nobody has claimed yet.
    Stored { owning_global_id: u64 },
}

/// Fixed-capacity ring of outstanding and completed request/response pairs.
pub struct CorrelationBuffer {
    entries: VecDeque<RequestResponseEntry>,
    capacity: usize,
    next_local_id: u8,
    next_global_id: u64,
}

impl CorrelationBuffer {
    pub fn new(capacity: usize) -> Self {
        CorrelationBuffer {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_local_id: 1,
            next_global_id: 1,
        }
    }

    /// Rotates the local request id through `1..=254`, never emitting `0`
    /// or `255`.
    fn take_local_id(&mut self) -> u8 {
        let id = self.next_local_id;
        self.next_local_id = if self.next_local_id >= 254 {
            1
        } else {
            self.next_local_id + 1
        };
        id
    }

    /// Records an outgoing command, assigning it a fresh local request id
    /// (overwriting whatever `sent.request_id` held) and a global id.
    /// Evicts the oldest entry if the ring is full. Returns the now-framable
    /// package (with the assigned local id) alongside its global id.
    pub fn send(&mut self, mut sent: Package) -> (Package, u64) {
        let local_id = self.take_local_id();
        sent.request_id = local_id;
        let global_id = self.next_global_id;
        self.next_global_id += 1;

        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
        }
        self.entries
            .push_front(RequestResponseEntry::new(local_id, global_id, sent.clone()));

        (sent, global_id)
    }

    /// Scans newest-to-oldest for an entry matching the response's
    /// request id, attaches the response, and — if that entry already
    /// has a response — chains a dummy-copy entry so the duplicate is
    /// preserved rather than dropped.
    pub fn add_response(&mut self, response: Package) -> UnsolicitedResponse {
        let local_id = response.request_id;

        let found = self
            .entries
            .iter()
            .position(|e| !e.is_consumed() && e.local_id == local_id);

        let owning_global_id = match found {
            None => 0,
            Some(idx) if !self.entries[idx].response_received => {
                self.entries[idx].response = Some(response.clone());
                self.entries[idx].response_received = true;
                self.entries[idx].received_at = Some(Instant::now());
                self.entries[idx].global_id
            }
            Some(idx) => {
                // Duplicate/streamed follow-up: the matched entry already has a
                // response, so chain a fresh dummy-copy entry right behind it
                // (preserving the newest-to-oldest order) and attach this
                // response there instead of dropping it.
                let original = self.entries[idx].clone();
                let global_id = self.next_global_id;
                self.next_global_id += 1;

                let mut dummy = RequestResponseEntry::new(original.local_id, global_id, original.sent);
                dummy.is_dummy = true;
                dummy.response = Some(response.clone());
                dummy.response_received = true;
                dummy.received_at = Some(Instant::now());

                if self.entries.len() >= self.capacity {
                    self.entries.pop_back();
                }
                // The pop above may have evicted `idx` itself (it's the
                // oldest entry in a full ring), so the insert index has to
                // be clamped to the post-pop length rather than assumed to
                // still be in bounds.
                let insert_idx = (idx + 1).min(self.entries.len());
                self.entries.insert(insert_idx, dummy);
                global_id
            }
        };

        if response.cmd_id == MESSAGE_ACK {
            if let Ok(message) = MessageAck::decode(response.payload.clone()) {
                if matches!(message.severity, Severity::Error | Severity::CriticalError)
                    && owning_global_id != 0
                {
                    if let Some(entry) = self
                        .entries
                        .iter_mut()
                        .find(|e| e.global_id == owning_global_id)
                    {
                        entry.error_code = Some(message.error_code);
                        entry.error_description = Some(message.text.clone());
                    }
                }
                return UnsolicitedResponse::Message {
                    message,
                    owning_global_id,
                };
            }
        }

        UnsolicitedResponse::Stored { owning_global_id }
    }

    /// One non-blocking scan for `global_id`'s response: claims and returns
    /// it if present, reports whether the id is still outstanding
    /// otherwise. Does not sleep or hold the buffer locked for any longer
    /// than one scan — callers that need to poll (like
    /// [`crate::host::GsbpHost`]) re-lock the buffer between attempts so a
    /// concurrent reader can still call [`Self::add_response`] while the
    /// wait is in progress.
    ///
    /// On success, the returned `open_requests` count is how many other
    /// non-consumed entries still share `global_id` after this claim
    /// (normally `0`; a duplicate/streamed response chains a dummy entry
    /// under the same `global_id`, so a caller that only reads this one
    /// claim would otherwise miss it).
    pub fn try_claim_response(
        &mut self,
        global_id: u64,
        expected_ack_cmd: Option<u16>,
    ) -> Option<Result<(Package, usize), Error>> {
        let matches_id = |e: &RequestResponseEntry| {
            !e.is_consumed()
                && e.global_id == global_id
                && e.response_received
                && expected_ack_cmd.is_none_or(|cmd| e.response.as_ref().is_some_and(|r| r.cmd_id == cmd))
        };

        if let Some(idx) = self.entries.iter().position(matches_id) {
            let count_matching = self
                .entries
                .iter()
                .filter(|e| !e.is_consumed() && e.global_id == global_id)
                .count();
            let entry = &mut self.entries[idx];
            let response = entry.response.clone().expect("response_received implies Some");
            entry.consume();
            return Some(Ok((response, count_matching - 1)));
        }

        let any_matching_id = self.entries.iter().any(|e| !e.is_consumed() && e.global_id == global_id);
        if any_matching_id {
            None
        } else {
            Some(Err(Error::NoRequestFound(global_id)))
        }
    }

    /// Marks every entry still outstanding under `global_id` as timed out.
    pub fn mark_timed_out(&mut self, global_id: u64) {
        for e in self.entries.iter_mut().filter(|e| e.global_id == global_id) {
            e.timed_out = true;
        }
    }

    /// Waits for a response in a single task: `timeout = None` means "one
    /// non-blocking scan". Polls in `POLL_INTERVAL` increments,
    /// mirroring the original `GetResponse`'s busy-poll-with-sleep loop.
    /// Holds `&mut self` (hence the whole buffer) for the entire wait, so
    /// this is only suitable when nothing else needs the buffer
    /// concurrently; [`crate::host::GsbpHost`] instead polls via
    /// [`Self::try_claim_response`], re-locking between attempts.
    pub async fn get_response(
        &mut self,
        global_id: u64,
        expected_ack_cmd: Option<u16>,
    ) -> Result<Package, Error> {
        self.get_response_with_timeout(global_id, expected_ack_cmd, None)
            .await
    }

    pub async fn get_response_with_timeout(
        &mut self,
        global_id: u64,
        expected_ack_cmd: Option<u16>,
        timeout: Option<Duration>,
    ) -> Result<Package, Error> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(result) = self.try_claim_response(global_id, expected_ack_cmd) {
                return result.map(|(response, open_requests)| {
                    tracing::debug!(global_id, open_requests, "claimed response");
                    response
                });
            }

            match deadline {
                None => return Err(Error::GetResponseTimeout),
                Some(deadline) if Instant::now() >= deadline => {
                    self.mark_timed_out(global_id);
                    return Err(Error::GetResponseTimeout);
                }
                Some(_) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
