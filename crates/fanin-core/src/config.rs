//! Emission and piping configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How piped output is batched before it is handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Send and flush every chunk as soon as it is emitted.
    #[default]
    Immediate,
    /// Accumulate bytes until `max_buffer_bytes` is reached, then send.
    Buffered,
    /// Send at the end of the stream only.
    Manual,
}

impl FlushPolicy {
    /// Check if a flush is due for the given number of pending bytes.
    pub fn is_due(&self, pending_bytes: usize, max_buffer_bytes: usize) -> bool {
        match self {
            Self::Immediate => pending_bytes > 0,
            Self::Buffered => pending_bytes > 0 && pending_bytes >= max_buffer_bytes,
            Self::Manual => false,
        }
    }
}

/// Configuration for output streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Drop zero-length chunks instead of emitting them.
    pub skip_empty_chunks: bool,
    /// Batching policy for `pipe_to_sink`.
    pub flush: FlushPolicy,
    /// Byte threshold for `FlushPolicy::Buffered`.
    pub max_buffer_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            skip_empty_chunks: false,
            flush: FlushPolicy::Immediate,
            max_buffer_bytes: 8192,
        }
    }
}

impl StreamConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from a file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Parse config from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Drop zero-length chunks.
    pub fn with_skip_empty_chunks(mut self, skip: bool) -> Self {
        self.skip_empty_chunks = skip;
        self
    }

    /// Set flush policy.
    pub fn with_flush(mut self, policy: FlushPolicy) -> Self {
        self.flush = policy;
        self
    }

    /// Set buffer threshold and switch to `FlushPolicy::Buffered`.
    pub fn with_max_buffer(mut self, bytes: usize) -> Self {
        self.flush = FlushPolicy::Buffered;
        self.max_buffer_bytes = bytes;
        self
    }
}
