//! Queued source items.

use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fanin_core::{Chunk, Failure};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use parking_lot::Mutex;

/// A boxed stream of chunks, as drained by the emitter.
pub type ChunkStream = BoxStream<'static, Result<Chunk, Failure>>;

/// The value a deferred settles to, or a factory returns.
pub type Settlement = Result<Source, Failure>;

/// One entry in a builder's ordered queue.
///
/// Every variant is a cheap handle, so a queue can be copied into any number of
/// snapshots. What a copy means depends on the kind:
/// - `Text` is immutable and replayed by every snapshot.
/// - `Stream` is single-pass; whichever resolution takes it first drains it, and every
///   other resolution of the same handle sees nothing.
/// - `Deferred` is shared; every snapshot observes the same settled value.
/// - `Factory` is invoked once per snapshot that resolves it.
/// - `Other` holds any value that is neither of the above and contributes no output.
#[derive(Clone)]
pub enum Source {
    Text(Arc<str>),
    Stream(SubStream),
    Deferred(Deferred),
    Factory(Factory),
    Other(Arc<dyn Any + Send + Sync>),
}

/// Kind of a source, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    Stream,
    Deferred,
    Factory,
    Other,
}

impl SourceKind {
    /// Get the name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Stream => "stream",
            Self::Deferred => "deferred",
            Self::Factory => "factory",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Source {
    /// Literal text.
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Self::Text(text.into())
    }

    /// A sub-stream of chunks. Its items are forwarded in order; an `Err` item fails
    /// the output stream.
    pub fn stream<S, C, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<C, E>> + Send + 'static,
        C: Into<Chunk> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Self::Stream(SubStream::new(stream))
    }

    /// A sub-stream over already-known chunks.
    pub fn iter<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        I::IntoIter: Send + 'static,
        C: Into<Chunk> + 'static,
    {
        Self::stream(stream::iter(chunks.into_iter().map(Ok::<C, Infallible>)))
    }

    /// A deferred value that cannot fail.
    pub fn deferred<F, S>(future: F) -> Self
    where
        F: Future<Output = S> + Send + 'static,
        S: Into<Source> + 'static,
    {
        Self::Deferred(Deferred::new(future))
    }

    /// A deferred value that may settle to an error.
    pub fn try_deferred<F, S, E>(future: F) -> Self
    where
        F: Future<Output = Result<S, E>> + Send + 'static,
        S: Into<Source> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Self::Deferred(Deferred::fallible(future))
    }

    /// A factory invoked when resolution begins.
    pub fn factory<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Into<Source> + 'static,
    {
        Self::Factory(Factory::new(factory))
    }

    /// A factory that may fail when invoked.
    pub fn try_factory<F, S, E>(factory: F) -> Self
    where
        F: Fn() -> Result<S, E> + Send + Sync + 'static,
        S: Into<Source> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Self::Factory(Factory::fallible(factory))
    }

    /// Any other value. It resolves to nothing.
    pub fn other<T: Any + Send + Sync>(value: T) -> Self {
        Self::Other(Arc::new(value))
    }

    /// Get the kind of this source.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Text(_) => SourceKind::Text,
            Self::Stream(_) => SourceKind::Stream,
            Self::Deferred(_) => SourceKind::Deferred,
            Self::Factory(_) => SourceKind::Factory,
            Self::Other(_) => SourceKind::Other,
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
            Self::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Other(_) => f.write_str("Other(..)"),
        }
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for Source {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

impl From<Arc<str>> for Source {
    fn from(text: Arc<str>) -> Self {
        Self::Text(text)
    }
}

impl From<SubStream> for Source {
    fn from(stream: SubStream) -> Self {
        Self::Stream(stream)
    }
}

impl From<Deferred> for Source {
    fn from(deferred: Deferred) -> Self {
        Self::Deferred(deferred)
    }
}

impl From<Factory> for Source {
    fn from(factory: Factory) -> Self {
        Self::Factory(factory)
    }
}

/// `None` is a nullish value: it is queued like any other item and resolves to nothing.
impl<T: Into<Source>> From<Option<T>> for Source {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Self::other(()),
        }
    }
}

/// Single-pass handle to a chunk stream.
#[derive(Clone)]
pub struct SubStream(Arc<Mutex<Option<ChunkStream>>>);

impl SubStream {
    /// Wrap a stream of chunk-like items.
    pub fn new<S, C, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<C, E>> + Send + 'static,
        C: Into<Chunk> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let stream = stream
            .map(|item| -> Result<Chunk, Failure> {
                item.map(Into::into).map_err(Failure::new)
            })
            .boxed();
        Self(Arc::new(Mutex::new(Some(stream))))
    }

    /// Take the stream out of the handle. Returns `None` once it has been taken.
    pub fn take(&self) -> Option<ChunkStream> {
        self.0.lock().take()
    }

    /// Check if the stream has already been taken for draining.
    pub fn is_taken(&self) -> bool {
        self.0.lock().is_none()
    }
}

impl fmt::Debug for SubStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubStream")
            .field("taken", &self.is_taken())
            .finish()
    }
}

/// A shared, lazily-polled value that settles to a `Source` or a failure.
#[derive(Clone)]
pub struct Deferred(Shared<BoxFuture<'static, Settlement>>);

impl Deferred {
    /// Wrap an infallible future.
    pub fn new<F, S>(future: F) -> Self
    where
        F: Future<Output = S> + Send + 'static,
        S: Into<Source> + 'static,
    {
        Self(
            future
                .map(|value| -> Settlement { Ok(value.into()) })
                .boxed()
                .shared(),
        )
    }

    /// Wrap a fallible future.
    pub fn fallible<F, S, E>(future: F) -> Self
    where
        F: Future<Output = Result<S, E>> + Send + 'static,
        S: Into<Source> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Self(
            future
                .map(|result| -> Settlement {
                    result.map(Into::into).map_err(Failure::new)
                })
                .boxed()
                .shared(),
        )
    }

    /// A deferred that has already settled to `value`.
    pub fn ready(value: impl Into<Source>) -> Self {
        Self::new(futures::future::ready(value.into()))
    }

    /// A deferred that has already settled to a failure.
    pub fn rejected(error: impl Into<anyhow::Error>) -> Self {
        let failure = Failure::new(error);
        Self(futures::future::ready(Err(failure)).boxed().shared())
    }

    /// Check if the value has settled.
    pub fn is_settled(&self) -> bool {
        self.0.peek().is_some()
    }

    /// Wait for the settled value.
    pub async fn settle(self) -> Settlement {
        self.0.await
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// A zero-argument callable producing a source when resolution begins.
#[derive(Clone)]
pub struct Factory(Arc<dyn Fn() -> Settlement + Send + Sync>);

impl Factory {
    /// Wrap an infallible callable.
    pub fn new<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Into<Source> + 'static,
    {
        Self(Arc::new(move || -> Settlement { Ok(factory().into()) }))
    }

    /// Wrap a fallible callable.
    pub fn fallible<F, S, E>(factory: F) -> Self
    where
        F: Fn() -> Result<S, E> + Send + Sync + 'static,
        S: Into<Source> + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Self(Arc::new(move || -> Settlement {
            factory().map(Into::into).map_err(Failure::new)
        }))
    }

    /// Invoke the factory.
    pub fn invoke(&self) -> Settlement {
        (self.0)()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory(..)")
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Source::from("a").kind(), SourceKind::Text);
        assert_eq!(Source::iter(["a"]).kind(), SourceKind::Stream);
        assert_eq!(Source::deferred(async { "a" }).kind(), SourceKind::Deferred);
        assert_eq!(Source::factory(|| "a").kind(), SourceKind::Factory);
        assert_eq!(Source::other(42).kind(), SourceKind::Other);
        assert_eq!(Source::from(None::<&str>).kind(), SourceKind::Other);
        assert_eq!(Source::from(Some("a")).kind(), SourceKind::Text);
    }

    #[test]
    fn test_substream_is_taken_once() {
        let stream = SubStream::new(stream::iter([Ok::<_, Infallible>("x")]));
        let copy = stream.clone();

        assert!(stream.take().is_some());
        assert!(copy.is_taken());
        assert!(copy.take().is_none());
    }

    #[test]
    fn test_deferred_shared_between_clones() {
        let deferred = Deferred::ready("done");
        let copy = deferred.clone();

        let first = block_on(deferred.settle()).unwrap();
        let second = block_on(copy.clone().settle()).unwrap();
        assert!(matches!(first, Source::Text(ref t) if &**t == "done"));
        assert!(matches!(second, Source::Text(ref t) if &**t == "done"));
        assert!(copy.is_settled());
    }

    #[test]
    fn test_rejected_deferred() {
        let err = block_on(Deferred::rejected(anyhow::anyhow!("nope")).settle()).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_fallible_factory() {
        let ok = Factory::fallible(|| Ok::<_, anyhow::Error>("fine"));
        assert!(ok.invoke().is_ok());

        let failing = Factory::fallible(|| Err::<&str, _>(anyhow::anyhow!("broken")));
        assert_eq!(failing.invoke().unwrap_err().to_string(), "broken");
    }

    #[test]
    fn test_debug_does_not_expose_payloads() {
        assert_eq!(format!("{:?}", Source::other(1u8)), "Other(..)");
        assert_eq!(format!("{:?}", Source::factory(|| "x")), "Factory(..)");
        assert_eq!(
            format!("{:?}", Source::iter(["x"])),
            "Stream(SubStream { taken: false })"
        );
    }
}
