//! Forwarding emission phases to `tracing`.

use std::time::Duration;

use fanin_core::{EmitObserver, EmitPhase};
use tracing::{debug, error, info, trace};

/// Observer that logs every emission phase.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    /// Create an observer whose events carry `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Get the label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl EmitObserver for TracingObserver {
    fn on_phase(&self, phase: &EmitPhase, elapsed: Duration) {
        let label = self.label.as_str();
        let elapsed_us = elapsed.as_micros() as u64;

        match phase {
            EmitPhase::Start { items } => debug!(label, items, "emission started"),
            EmitPhase::ItemReady(index) => trace!(label, index, elapsed_us, "source ready"),
            EmitPhase::ItemDrained {
                index,
                chunks,
                bytes,
            } => trace!(label, index, chunks, bytes, elapsed_us, "source drained"),
            EmitPhase::Completion => info!(label, elapsed_us, "emission completed"),
            EmitPhase::Error(message) => {
                error!(label, elapsed_us, error = %message, "emission failed")
            }
        }
    }
}
