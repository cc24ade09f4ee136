//! Ordered resolution and emission.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use fanin_core::{Chunk, EmitObserver, EmitPhase, EmitTiming, Failure, StreamConfig, StreamError};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FusedStream, FuturesUnordered, Stream, StreamExt, TryStreamExt};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, debug_span, trace, warn, Span};

use crate::classify::{classify, Content, Resolution};
use crate::source::{ChunkStream, Source, SubStream};

type PendingResolution = BoxFuture<'static, (usize, Result<Content, Failure>)>;

/// Resolution state of one snapshot position.
enum Slot {
    /// Still resolving in the background.
    Waiting,
    /// Resolved, not yet emitted.
    Ready(Result<Content, Failure>),
    /// Handed to the emitter.
    Taken,
}

/// Single-pass output stream over one snapshot of sources.
///
/// On first poll every source is classified in order (factories are invoked with no
/// suspension in between) and every deferred value starts resolving. Content is then
/// emitted strictly in snapshot order: the stream waits on position `i` even if later
/// positions are already done, and a sub-stream at `i` is drained completely before
/// position `i + 1` is looked at.
///
/// Inside a tokio runtime each pending resolution runs as its own task, so it keeps
/// progressing while the consumer is busy between pulls. Without a runtime the
/// resolutions are driven from this stream's own `poll_next` instead. Dropping the
/// stream aborts any task that has not settled.
///
/// A failure at position `i` is yielded as one `Err` item after the chunks of earlier
/// positions, and the stream then ends. Once ended it yields `None` forever.
pub struct OutputStream {
    unstarted: Option<Vec<Source>>,
    items: usize,
    slots: Vec<Slot>,
    resolving: FuturesUnordered<PendingResolution>,
    tasks: Vec<AbortHandle>,
    next: usize,
    draining: Option<ChunkStream>,
    item_chunks: usize,
    item_bytes: usize,
    terminated: bool,
    config: StreamConfig,
    observer: Option<Arc<dyn EmitObserver>>,
    timing: EmitTiming,
    span: Span,
}

impl OutputStream {
    pub(crate) fn new(
        sources: Vec<Source>,
        config: StreamConfig,
        observer: Option<Arc<dyn EmitObserver>>,
    ) -> Self {
        let items = sources.len();
        Self {
            unstarted: Some(sources),
            items,
            slots: Vec::new(),
            resolving: FuturesUnordered::new(),
            tasks: Vec::new(),
            next: 0,
            draining: None,
            item_chunks: 0,
            item_bytes: 0,
            terminated: false,
            config,
            observer,
            timing: EmitTiming::new(),
            span: debug_span!("fanin.emit", items),
        }
    }

    /// Number of sources in the snapshot.
    pub fn items(&self) -> usize {
        self.items
    }

    /// Check if resolution has begun.
    pub fn is_started(&self) -> bool {
        self.unstarted.is_none()
    }

    /// Number of positions fully emitted so far.
    pub fn emitted_items(&self) -> usize {
        self.next
    }

    /// Timing marks recorded so far.
    pub fn timing(&self) -> &EmitTiming {
        &self.timing
    }

    /// Drain the stream into one byte buffer.
    pub async fn collect_bytes(self) -> Result<Vec<u8>, StreamError> {
        self.try_fold(Vec::new(), |mut buf, chunk| async move {
            buf.extend_from_slice(chunk.as_bytes());
            Ok(buf)
        })
        .await
    }

    /// Drain the stream into a string. Invalid UTF-8 is replaced.
    pub async fn collect_string(self) -> Result<String, StreamError> {
        let bytes = self.collect_bytes().await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    fn kickoff(&mut self, sources: Vec<Source>) {
        self.timing = EmitTiming::new();
        self.slots = Vec::with_capacity(sources.len());
        let runtime = Handle::try_current().ok();

        for (index, source) in sources.into_iter().enumerate() {
            let kind = source.kind();
            match classify(source) {
                Resolution::Ready(result) => self.slots.push(Slot::Ready(result)),
                Resolution::Pending(future) => {
                    self.slots.push(Slot::Waiting);
                    let pending = match &runtime {
                        Some(handle) => {
                            let task = handle.spawn(future);
                            self.tasks.push(task.abort_handle());
                            task.map(move |joined| {
                                (index, joined.unwrap_or_else(|err| Err(Failure::new(err))))
                            })
                            .boxed()
                        }
                        None => future.map(move |result| (index, result)).boxed(),
                    };
                    self.resolving.push(pending);
                }
            }
            trace!(index, %kind, "source classified");
        }

        debug!(
            items = self.items,
            pending = self.resolving.len(),
            spawned = self.tasks.len(),
            "resolution started"
        );
        self.notify(EmitPhase::Start { items: self.items });
    }

    /// Move every settled background resolution into its slot.
    fn drive_resolutions(&mut self, cx: &mut Context<'_>) {
        while let Poll::Ready(Some((index, result))) = self.resolving.poll_next_unpin(cx) {
            trace!(index, ok = result.is_ok(), "source settled");
            self.slots[index] = Slot::Ready(result);
        }
    }

    /// Account for a chunk of the current position. Returns `None` if it is skipped.
    fn accept(&mut self, chunk: Chunk) -> Option<Chunk> {
        if self.config.skip_empty_chunks && chunk.is_empty() {
            return None;
        }
        self.item_chunks += 1;
        self.item_bytes += chunk.len();
        self.timing.mark_first_chunk();
        Some(chunk)
    }

    fn start_item(&mut self) {
        self.timing.mark_ready(self.next);
        self.notify(EmitPhase::ItemReady(self.next));
    }

    fn finish_item(&mut self) {
        let index = self.next;
        self.timing.mark_drained(index);
        trace!(index, chunks = self.item_chunks, bytes = self.item_bytes, "source emitted");
        self.notify(EmitPhase::ItemDrained {
            index,
            chunks: self.item_chunks,
            bytes: self.item_bytes,
        });
        self.item_chunks = 0;
        self.item_bytes = 0;
        self.next += 1;
    }

    fn complete(&mut self) {
        self.terminated = true;
        debug!(
            items = self.items,
            elapsed_us = self.timing.elapsed().as_micros() as u64,
            "output stream completed"
        );
        self.notify(EmitPhase::Completion);
    }

    fn fail(&mut self, error: StreamError) -> StreamError {
        self.terminated = true;
        self.draining = None;
        self.abort_pending();
        warn!(index = self.next, error = %error, "output stream failed");
        self.notify(EmitPhase::Error(error.to_string()));
        error
    }

    /// Stop every resolution that has not been emitted yet.
    fn abort_pending(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.resolving = FuturesUnordered::new();
    }

    fn notify(&self, phase: EmitPhase) {
        if let Some(observer) = &self.observer {
            observer.on_phase(&phase, self.timing.elapsed());
        }
    }
}

impl Stream for OutputStream {
    type Item = Result<Chunk, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        let span = this.span.clone();
        let _entered = span.enter();

        if let Some(sources) = this.unstarted.take() {
            this.kickoff(sources);
        }

        loop {
            this.drive_resolutions(cx);

            if let Some(stream) = this.draining.as_mut() {
                match stream.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(chunk))) => {
                        if let Some(chunk) = this.accept(chunk) {
                            return Poll::Ready(Some(Ok(chunk)));
                        }
                        continue;
                    }
                    Poll::Ready(Some(Err(source))) => {
                        let index = this.next;
                        let error = this.fail(StreamError::SubStream { index, source });
                        return Poll::Ready(Some(Err(error)));
                    }
                    Poll::Ready(None) => {
                        this.draining = None;
                        this.finish_item();
                        continue;
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            if this.next == this.slots.len() {
                this.complete();
                return Poll::Ready(None);
            }

            let index = this.next;
            match std::mem::replace(&mut this.slots[index], Slot::Taken) {
                Slot::Waiting => {
                    this.slots[index] = Slot::Waiting;
                    return Poll::Pending;
                }
                Slot::Taken => unreachable!("slot {index} emitted twice"),
                Slot::Ready(Ok(Content::Text(text))) => {
                    this.start_item();
                    let chunk = this.accept(Chunk::Text(text.to_string()));
                    this.finish_item();
                    if let Some(chunk) = chunk {
                        return Poll::Ready(Some(Ok(chunk)));
                    }
                }
                Slot::Ready(Ok(Content::Stream(stream))) => {
                    this.start_item();
                    this.draining = Some(stream);
                }
                Slot::Ready(Ok(Content::Empty)) => {
                    this.start_item();
                    this.finish_item();
                }
                Slot::Ready(Err(source)) => {
                    let error = this.fail(StreamError::Resolution { index, source });
                    return Poll::Ready(Some(Err(error)));
                }
            }
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

impl FusedStream for OutputStream {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream")
            .field("items", &self.items)
            .field("started", &self.is_started())
            .field("emitted", &self.next)
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// An output stream can be queued as a sub-stream of another builder.
impl From<OutputStream> for Source {
    fn from(stream: OutputStream) -> Self {
        Source::Stream(SubStream::new(stream))
    }
}
