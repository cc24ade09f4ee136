//! Observability for ordered output streams.
//!
//! This crate provides:
//! - `LogConfig` / `init_logging` - `tracing` subscriber installation
//! - `MetricsCollector` - Per-stream emission metrics
//! - `TracingObserver` - Forwards emission phases to `tracing`

mod logging;
mod metrics;
mod observer;

pub use logging::*;
pub use metrics::*;
pub use observer::*;

// Re-export lifecycle types from fanin-core for convenience
pub use fanin_core::{EmitObserver, EmitPhase, EmitTiming};
