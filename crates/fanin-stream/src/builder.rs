//! Append-only source queue with snapshot builds.

use std::fmt;
use std::sync::Arc;

use fanin_core::{EmitObserver, StreamConfig};
use tracing::debug;

use crate::emitter::OutputStream;
use crate::source::Source;

/// Builder for ordered output streams.
///
/// Sources are appended in order with `push`. Each `build()` copies the current queue
/// into a new `OutputStream`; sources pushed afterwards only show up in later builds.
///
/// ```ignore
/// let mut page = StreamBuilder::from_iter([
///     "<!doctype html><html><head><title>",
///     "Stream Builder",
///     "</title></head>",
/// ]);
/// page.push(Source::deferred(render_body()));
/// page.push("</html>");
///
/// let body = page.build();
/// ```
#[derive(Clone, Default)]
pub struct StreamBuilder {
    sources: Vec<Source>,
    config: StreamConfig,
    observer: Option<Arc<dyn EmitObserver>>,
}

impl StreamBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from optional initial sources. `None` is an empty queue.
    pub fn from_sources(initial: Option<Vec<Source>>) -> Self {
        Self {
            sources: initial.unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Set the configuration for streams built from now on.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach an observer to streams built from now on.
    pub fn with_observer(mut self, observer: Arc<dyn EmitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Append one source.
    pub fn push(&mut self, source: impl Into<Source>) -> &mut Self {
        self.sources.push(source.into());
        self
    }

    /// Append several sources, in iteration order.
    pub fn push_all<I, S>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    /// Snapshot the queue into a new output stream.
    ///
    /// Nothing is resolved here; factories run when the stream is first polled.
    pub fn build(&self) -> OutputStream {
        debug!(items = self.sources.len(), "snapshot built");
        OutputStream::new(
            self.sources.clone(),
            self.config.clone(),
            self.observer.clone(),
        )
    }

    /// Number of queued sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl<S: Into<Source>> FromIterator<S> for StreamBuilder {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut builder = Self::new();
        builder.push_all(iter);
        builder
    }
}

impl<S: Into<Source>> Extend<S> for StreamBuilder {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.push_all(iter);
    }
}

impl fmt::Debug for StreamBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBuilder")
            .field("sources", &self.sources)
            .field("config", &self.config)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::executor::block_on;
    use futures::StreamExt;
    use parking_lot::Mutex;

    use fanin_core::EmitPhase;

    use super::*;

    #[test]
    fn test_each_build_is_distinct() {
        let builder = StreamBuilder::from_iter(["foo bar"]);
        let mut first = builder.build();
        let second = builder.build();

        assert_eq!(block_on(first.next()).unwrap().unwrap().to_string(), "foo bar");
        assert!(first.is_started());
        assert!(!second.is_started());
        assert_eq!(block_on(second.collect_string()).unwrap(), "foo bar");
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut builder = StreamBuilder::from_iter(["foo__", "bar__"]);
        let first = builder.build();

        builder.push("baz");
        let second = builder.build();

        assert_eq!(block_on(first.collect_string()).unwrap(), "foo__bar__");
        assert_eq!(block_on(second.collect_string()).unwrap(), "foo__bar__baz");
    }

    #[test]
    fn test_none_initial_sources() {
        let mut builder = StreamBuilder::from_sources(None);
        assert!(builder.is_empty());

        builder.push_all([
            Source::from("always there"),
            Source::factory(|| Source::deferred(async { " after" })),
        ]);
        assert_eq!(builder.len(), 2);
        assert_eq!(
            block_on(builder.build().collect_string()).unwrap(),
            "always there after"
        );
    }

    #[test]
    fn test_build_does_not_invoke_factories() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut builder = StreamBuilder::new();
        builder.push(Source::factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "made"
        }));

        let first = builder.build();
        let second = builder.build();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(block_on(first.collect_string()).unwrap(), "made");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(block_on(second.collect_string()).unwrap(), "made");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stream_source_drained_by_one_snapshot_only() {
        let builder =
            StreamBuilder::from_iter([Source::from("<"), Source::iter(["a", "b"]), ">".into()]);
        let first = builder.build();
        let second = builder.build();

        assert_eq!(block_on(first.collect_string()).unwrap(), "<ab>");
        assert_eq!(block_on(second.collect_string()).unwrap(), "<>");
    }

    #[test]
    fn test_same_stream_pushed_twice() {
        let shared = Source::iter(["once"]);
        let mut builder = StreamBuilder::new();
        builder.push(shared.clone()).push("|").push(shared);
        assert_eq!(block_on(builder.build().collect_string()).unwrap(), "once|");
    }

    #[test]
    fn test_deferred_shared_across_snapshots() {
        let builder = StreamBuilder::from_iter([Source::deferred(async { "same" })]);
        assert_eq!(block_on(builder.build().collect_string()).unwrap(), "same");
        assert_eq!(block_on(builder.build().collect_string()).unwrap(), "same");
    }

    #[test]
    fn test_extend() {
        let mut builder = StreamBuilder::new();
        builder.extend(["a", "b"]);
        builder.extend(vec![String::from("c")]);
        assert_eq!(block_on(builder.build().collect_string()).unwrap(), "abc");
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EmitPhase>>);

    impl EmitObserver for Recorder {
        fn on_phase(&self, phase: &EmitPhase, _elapsed: std::time::Duration) {
            self.0.lock().push(phase.clone());
        }
    }

    #[test]
    fn test_observer_sees_phases_in_order() {
        let recorder = Arc::new(Recorder::default());
        let builder = StreamBuilder::from_iter([
            Source::from("ab"),
            Source::other(1),
            Source::iter(["c", "de"]),
        ])
        .with_observer(recorder.clone());

        let mut stream = builder.build();
        while block_on(stream.next()).is_some() {}

        let phases = recorder.0.lock().clone();
        assert_eq!(
            phases,
            vec![
                EmitPhase::Start { items: 3 },
                EmitPhase::ItemReady(0),
                EmitPhase::ItemDrained { index: 0, chunks: 1, bytes: 2 },
                EmitPhase::ItemReady(1),
                EmitPhase::ItemDrained { index: 1, chunks: 0, bytes: 0 },
                EmitPhase::ItemReady(2),
                EmitPhase::ItemDrained { index: 2, chunks: 2, bytes: 3 },
                EmitPhase::Completion,
            ]
        );
    }

    #[test]
    fn test_observer_sees_failure() {
        let recorder = Arc::new(Recorder::default());
        let builder = StreamBuilder::from_iter([Source::try_deferred(async {
            Err::<&str, _>(anyhow::anyhow!("cms down"))
        })])
        .with_observer(recorder.clone());

        let err = block_on(builder.build().collect_string()).unwrap_err();
        assert_eq!(err.index(), Some(0));

        let phases = recorder.0.lock().clone();
        assert_eq!(
            phases.last(),
            Some(&EmitPhase::Error("Source 0 failed to resolve: cms down".to_string()))
        );
    }
}
