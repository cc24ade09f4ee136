//! Emission lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases of one output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitPhase {
    /// Kickoff finished: every source of the snapshot is resolving.
    Start {
        /// Number of sources in the snapshot.
        items: usize,
    },
    /// The source at this index finished resolving and is next to be emitted.
    ItemReady(usize),
    /// The source at this index has been fully emitted.
    ItemDrained {
        index: usize,
        chunks: usize,
        bytes: usize,
    },
    /// All sources emitted; the stream ended cleanly.
    Completion,
    /// The stream terminated with an error.
    Error(String),
}

/// Timing context for one output stream.
#[derive(Debug, Clone)]
pub struct EmitTiming {
    start: Instant,
    first_chunk: Option<Instant>,
    ready: HashMap<usize, Instant>,
    drained: HashMap<usize, Instant>,
}

impl EmitTiming {
    /// Create a new timing context starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            first_chunk: None,
            ready: HashMap::new(),
            drained: HashMap::new(),
        }
    }

    /// Record the first emitted chunk. Later calls are ignored.
    pub fn mark_first_chunk(&mut self) {
        self.first_chunk.get_or_insert_with(Instant::now);
    }

    /// Mark an item as ready for emission.
    pub fn mark_ready(&mut self, index: usize) {
        self.ready.insert(index, Instant::now());
    }

    /// Mark an item as fully emitted.
    pub fn mark_drained(&mut self, index: usize) {
        self.drained.insert(index, Instant::now());
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get time to the first emitted chunk.
    pub fn time_to_first_chunk(&self) -> Option<Duration> {
        self.first_chunk.map(|t| t.duration_since(self.start))
    }

    /// Get timing for a specific item.
    pub fn item_timing(&self, index: usize) -> Option<ItemTiming> {
        let ready = self.ready.get(&index)?;
        let drained = self.drained.get(&index)?;

        Some(ItemTiming {
            index,
            ready: ready.duration_since(self.start),
            drained: drained.duration_since(self.start),
            emitting: drained.duration_since(*ready),
        })
    }
}

impl Default for EmitTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing information for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTiming {
    /// Item index in the snapshot.
    pub index: usize,
    /// Time from kickoff until the emitter reached this item with its content ready.
    pub ready: Duration,
    /// Time from kickoff until the item was fully emitted.
    pub drained: Duration,
    /// Time spent emitting (draining) the item.
    pub emitting: Duration,
}

/// Observer trait for emission events.
pub trait EmitObserver: Send + Sync {
    /// Called when a lifecycle phase occurs.
    fn on_phase(&self, phase: &EmitPhase, elapsed: Duration);
}
