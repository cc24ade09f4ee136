//! Writing output streams into byte sinks.

use std::fmt::Display;

use fanin_core::{Chunk, StreamConfig, StreamError};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, warn};

use crate::flush::FlushController;

/// Totals for one piped stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeSummary {
    /// Chunks received from the stream.
    pub chunks: usize,
    /// Bytes received from the stream.
    pub bytes: usize,
    /// Writes handed to the sink.
    pub flushes: usize,
}

/// Byte sink wrapper that batches chunks according to a flush policy.
///
/// This is generic over the underlying sink type to work with any
/// `Sink<Vec<u8>>` implementation, such as a response body channel.
pub struct ChunkSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    controller: FlushController,
    summary: PipeSummary,
    completed: bool,
}

impl<S, E> ChunkSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a new chunk sink.
    pub fn new(sink: S, config: &StreamConfig) -> Self {
        Self {
            inner: sink,
            controller: FlushController::from_config(config),
            summary: PipeSummary::default(),
            completed: false,
        }
    }

    /// Buffer one chunk, writing to the sink if a flush is due.
    pub async fn send_chunk(&mut self, chunk: &Chunk) -> Result<(), StreamError> {
        if self.completed {
            return Err(StreamError::Sink("Sink already completed".to_string()));
        }

        self.summary.chunks += 1;
        self.summary.bytes += chunk.len();
        self.controller.add(chunk.as_bytes());

        if self.controller.should_flush() {
            self.write_pending().await?;
        }

        Ok(())
    }

    /// Write any buffered bytes and flush the sink.
    pub async fn finish(&mut self) -> Result<PipeSummary, StreamError> {
        if !self.completed {
            self.completed = true;
            self.write_pending().await?;
            self.inner
                .flush()
                .await
                .map_err(|e| StreamError::Sink(e.to_string()))?;
        }
        Ok(self.summary)
    }

    /// Get totals so far.
    pub fn summary(&self) -> PipeSummary {
        self.summary
    }

    /// Consume the wrapper and return the inner sink.
    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn write_pending(&mut self) -> Result<(), StreamError> {
        if self.controller.pending_bytes() == 0 {
            return Ok(());
        }

        let bytes = self.controller.take();
        self.inner
            .send(bytes)
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))?;
        self.summary.flushes += 1;

        Ok(())
    }
}

/// Pipe a chunk stream into a byte sink.
///
/// Chunks already emitted before a stream failure are written and flushed, then the
/// failure is returned.
pub async fn pipe_to_sink<St, S, E>(
    mut stream: St,
    sink: S,
    config: &StreamConfig,
) -> Result<PipeSummary, StreamError>
where
    St: Stream<Item = Result<Chunk, StreamError>> + Unpin,
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    let mut sink = ChunkSink::new(sink, config);

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => sink.send_chunk(&chunk).await?,
            Err(error) => {
                if let Err(flush_error) = sink.finish().await {
                    warn!(error = %flush_error, "flush after stream failure failed");
                }
                return Err(error);
            }
        }
    }

    let summary = sink.finish().await?;
    debug!(
        chunks = summary.chunks,
        bytes = summary.bytes,
        flushes = summary.flushes,
        "pipe finished"
    );
    Ok(summary)
}
