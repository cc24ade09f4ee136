//! Core types for ordered stream composition.
//!
//! This crate provides the fundamental types shared by the workspace:
//! - `Chunk` - A unit of output (text or binary)
//! - `StreamError` / `Failure` - Error taxonomy for emission
//! - `StreamConfig` - Emission and piping configuration
//! - `EmitPhase` / `EmitObserver` - Emission lifecycle tracking

mod chunk;
mod config;
mod error;
mod lifecycle;

pub use chunk::*;
pub use config::*;
pub use error::*;
pub use lifecycle::*;
