//! Explicit flush control for piped output.

use fanin_core::{FlushPolicy, StreamConfig};

/// Accumulates emitted bytes and decides when they are handed to the sink.
#[derive(Debug)]
pub struct FlushController {
    policy: FlushPolicy,
    max_buffer: usize,
    pending: Vec<u8>,
}

impl FlushController {
    /// Create a new flush controller with given policy.
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            max_buffer: StreamConfig::default().max_buffer_bytes,
            pending: Vec::new(),
        }
    }

    /// Create a controller from stream configuration.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.flush).with_max_buffer(config.max_buffer_bytes)
    }

    /// Set maximum bytes to buffer before a flush is due.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = bytes;
        self
    }

    /// Append bytes to the buffer.
    pub fn add(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Check if flush is needed.
    pub fn should_flush(&self) -> bool {
        self.policy.is_due(self.pending.len(), self.max_buffer)
    }

    /// Take the buffered bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// Number of bytes waiting to be flushed.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Get current policy.
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }
}

impl Default for FlushController {
    fn default() -> Self {
        Self::new(FlushPolicy::default())
    }
}
