//! Emission metrics.

use std::collections::HashMap;
use std::time::Duration;

use fanin_core::{EmitObserver, EmitPhase};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Metrics for one output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitMetrics {
    /// Label for correlation (e.g. route or page name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Number of sources in the snapshot.
    pub items: usize,
    /// Chunks emitted.
    pub chunks: usize,
    /// Bytes emitted.
    pub bytes: usize,
    /// Time until the first source with content was fully emitted (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_item_us: Option<u64>,
    /// Time until the stream ended, cleanly or not (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_us: Option<u64>,
    /// Whether the stream ended cleanly.
    pub completed: bool,
    /// Error message if the stream failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-source metrics, in emission order.
    pub sources: Vec<SourceMetrics>,
}

/// Metrics for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetrics {
    /// Position in the snapshot.
    pub index: usize,
    /// Time from kickoff until the emitter reached this source (microseconds).
    pub ready_us: u64,
    /// Time from kickoff until the source was fully emitted (microseconds).
    pub drained_us: u64,
    /// Chunks emitted for this source.
    pub chunks: usize,
    /// Bytes emitted for this source.
    pub bytes: usize,
}

#[derive(Debug, Default)]
struct CollectorState {
    metrics: EmitMetrics,
    ready_at: HashMap<usize, u64>,
}

/// Observer that aggregates emission metrics.
///
/// Attach one collector per built stream; phases from several streams would be mixed.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector with a correlation label.
    pub fn with_label(label: impl Into<String>) -> Self {
        let collector = Self::new();
        collector.state.lock().metrics.label = Some(label.into());
        collector
    }

    /// Get the metrics collected so far.
    pub fn snapshot(&self) -> EmitMetrics {
        self.state.lock().metrics.clone()
    }
}

impl EmitObserver for MetricsCollector {
    fn on_phase(&self, phase: &EmitPhase, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros() as u64;
        let mut state = self.state.lock();

        match phase {
            EmitPhase::Start { items } => state.metrics.items = *items,
            EmitPhase::ItemReady(index) => {
                state.ready_at.insert(*index, elapsed_us);
            }
            EmitPhase::ItemDrained {
                index,
                chunks,
                bytes,
            } => {
                let ready_us = state.ready_at.remove(index).unwrap_or(elapsed_us);
                let metrics = &mut state.metrics;
                metrics.chunks += chunks;
                metrics.bytes += bytes;
                if *chunks > 0 && metrics.time_to_first_item_us.is_none() {
                    metrics.time_to_first_item_us = Some(elapsed_us);
                }
                metrics.sources.push(SourceMetrics {
                    index: *index,
                    ready_us,
                    drained_us: elapsed_us,
                    chunks: *chunks,
                    bytes: *bytes,
                });
            }
            EmitPhase::Completion => {
                state.metrics.completed = true;
                state.metrics.total_duration_us = Some(elapsed_us);
            }
            EmitPhase::Error(message) => {
                state.metrics.error = Some(message.clone());
                state.metrics.total_duration_us = Some(elapsed_us);
            }
        }
    }
}

impl EmitMetrics {
    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as JSON (pretty printed).
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Stream: {} ({} sources, {} chunks, {} bytes)",
            self.label.as_deref().unwrap_or("unlabelled"),
            self.items,
            self.chunks,
            self.bytes
        ));

        if let Some(ttfi) = self.time_to_first_item_us {
            lines.push(format!(
                "  Time to first item: {}us ({:.2}ms)",
                ttfi,
                ttfi as f64 / 1000.0
            ));
        }

        if let Some(total) = self.total_duration_us {
            lines.push(format!(
                "  Total: {}us ({:.2}ms)",
                total,
                total as f64 / 1000.0
            ));
        }

        for source in &self.sources {
            lines.push(format!(
                "    #{}: {} chunks, {} bytes, emitted in {}us",
                source.index,
                source.chunks,
                source.bytes,
                source.drained_us.saturating_sub(source.ready_us)
            ));
        }

        if let Some(error) = &self.error {
            lines.push(format!("  FAILED: {}", error));
        }

        lines.join("\n")
    }
}
