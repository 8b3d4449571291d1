//! Process-wide counters, mirroring the original's `statsGSBP_t`.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Statistics {
    pub packages_received_good: u64,
    pub packages_missing_after_timeout: u64,
    pub packages_broken_checksum: u64,
    pub packages_broken_structure: u64,
    pub bytes_discarded: u64,
    pub resync_events: u64,
    pub handles_registered: u64,
    pub next_local_request_id: u8,
    pub next_global_request_id: u64,
    pub started_at: Instant,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics {
            packages_received_good: 0,
            packages_missing_after_timeout: 0,
            packages_broken_checksum: 0,
            packages_broken_structure: 0,
            bytes_discarded: 0,
            resync_events: 0,
            handles_registered: 0,
            next_local_request_id: 1,
            next_global_request_id: 0,
            started_at: Instant::now(),
        }
    }

    fn record_discarded(&mut self, n: u64) {
        if n > 0 {
            self.bytes_discarded += n;
            self.resync_events += 1;
        }
    }

    /// A frame was masked because its header checksum didn't match.
    pub fn record_broken_checksum(&mut self, n: u64) {
        self.record_discarded(n);
        self.packages_broken_checksum += 1;
    }

    /// Bytes were discarded resynchronizing past a missing start sentinel
    /// or a header whose declared length put the end sentinel somewhere
    /// else.
    pub fn record_broken_structure(&mut self, n: u64) {
        self.record_discarded(n);
        self.packages_broken_structure += 1;
    }

    /// A wait for a response ran out its timeout with nothing claimed.
    pub fn record_timeout(&mut self) {
        self.packages_missing_after_timeout += 1;
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}
