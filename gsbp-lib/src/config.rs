//! Host/device tuning knobs layered on top of [`gsbp_core::ProtocolDescriptor`].
//!
//! Builder-style construction: `fn new() -> Self` defaults with chained
//! `fn foo(self, ...) -> Self` setters, same shape as other small
//! configuration structs in this codebase.

use gsbp_core::ProtocolDescriptor;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Hardware,
}

/// Everything a [`crate::host::GsbpHost`] or [`crate::device::GsbpDevice`]
/// needs beyond the wire shape itself.
#[derive(Debug, Clone)]
pub struct GsbpConfig {
    pub descriptor: ProtocolDescriptor,
    pub baud_rate: u32,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub response_timeout: Duration,
    pub correlation_capacity: usize,
    pub scratch_capacity: usize,
    pub max_handles: usize,
}

impl GsbpConfig {
    pub fn new() -> Self {
        GsbpConfig {
            descriptor: ProtocolDescriptor::reference(),
            baud_rate: 1_000_000,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            response_timeout: Duration::from_millis(11),
            correlation_capacity: crate::correlation::DEFAULT_CAPACITY,
            scratch_capacity: 4096,
            max_handles: 4,
        }
    }

    pub fn descriptor(mut self, descriptor: ProtocolDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn correlation_capacity(mut self, capacity: usize) -> Self {
        self.correlation_capacity = capacity;
        self
    }
}

impl Default for GsbpConfig {
    fn default() -> Self {
        Self::new()
    }
}
