//! Ordered composition of heterogeneous content sources into one output stream.
//!
//! Sources are declared in order and may take any amount of time to become ready.
//! All of them start resolving as soon as the output stream is first polled, and their
//! content is emitted strictly in declaration order:
//! - `Source` - Text, sub-stream, deferred value, factory (or an unsupported value)
//! - `classify` - Turns one source into resolved `Content`
//! - `OutputStream` - Concurrent kickoff, sequential emission
//! - `StreamBuilder` - Append-only queue with snapshot `build()`
//! - `ChunkSink` / `pipe_to_sink` - Writing output into a byte sink

mod builder;
mod classify;
mod emitter;
mod flush;
mod sink;
mod source;

pub use builder::*;
pub use classify::*;
pub use emitter::*;
pub use flush::*;
pub use sink::*;
pub use source::*;
