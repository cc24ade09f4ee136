//! Source classification.

use std::fmt;
use std::sync::Arc;

use fanin_core::Failure;
use futures::future::{BoxFuture, FutureExt};

use crate::source::{ChunkStream, Source};

/// Fully resolved content of one source.
pub enum Content {
    /// Emitted as a single chunk.
    Text(Arc<str>),
    /// Drained chunk by chunk.
    Stream(ChunkStream),
    /// Unsupported or nullish value; emits nothing.
    Empty,
}

impl Content {
    /// Check if this content emits nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// Outcome of classifying one source at kickoff.
pub enum Resolution {
    /// Content is known without waiting.
    Ready(Result<Content, Failure>),
    /// Content depends on a deferred value that has not been awaited yet.
    Pending(BoxFuture<'static, Result<Content, Failure>>),
}

impl Resolution {
    /// Wait for the content.
    pub async fn resolve(self) -> Result<Content, Failure> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }

    /// Check if the content is known without waiting.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Classify one source and start its resolution.
///
/// A factory is invoked here, exactly once, and its return value is classified in turn.
/// Only one level of indirection is followed: a factory returning another factory
/// resolves to `Content::Empty`. Errors from the factory or the deferred value are
/// returned as failures, never converted to `Empty`.
pub fn classify(source: Source) -> Resolution {
    match source {
        Source::Factory(factory) => match factory.invoke() {
            Ok(produced) => classify_value(produced),
            Err(failure) => Resolution::Ready(Err(failure)),
        },
        other => classify_value(other),
    }
}

fn classify_value(source: Source) -> Resolution {
    match source {
        Source::Deferred(deferred) => Resolution::Pending(
            deferred
                .settle()
                .map(|settled| settled.map(into_content))
                .boxed(),
        ),
        other => Resolution::Ready(Ok(into_content(other))),
    }
}

/// Map a settled value onto content. Anything but text or an untaken stream is empty.
fn into_content(source: Source) -> Content {
    match source {
        Source::Text(text) => Content::Text(text),
        Source::Stream(stream) => stream.take().map_or(Content::Empty, Content::Stream),
        Source::Deferred(_) | Source::Factory(_) | Source::Other(_) => Content::Empty,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::executor::block_on;

    use super::*;

    fn text_of(resolution: Resolution) -> Option<String> {
        match block_on(resolution.resolve()) {
            Ok(Content::Text(text)) => Some(text.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_text_is_ready() {
        let resolution = classify(Source::from("a"));
        assert!(resolution.is_ready());
        assert_eq!(text_of(resolution).as_deref(), Some("a"));
    }

    #[test]
    fn test_stream_is_ready() {
        let resolution = classify(Source::iter(["a", "b"]));
        assert!(matches!(resolution, Resolution::Ready(Ok(Content::Stream(_)))));
    }

    #[test]
    fn test_taken_stream_is_empty() {
        let source = Source::iter(["a"]);
        let _first = classify(source.clone());
        let second = classify(source);
        assert!(matches!(second, Resolution::Ready(Ok(Content::Empty))));
    }

    #[test]
    fn test_deferred_is_pending() {
        let resolution = classify(Source::deferred(async { "b" }));
        assert!(!resolution.is_ready());
        assert_eq!(text_of(resolution).as_deref(), Some("b"));
    }

    #[test]
    fn test_deferred_unsupported_value_is_empty() {
        let resolution = classify(Source::deferred(async { Source::other(42) }));
        let content = block_on(resolution.resolve()).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_deferred_to_deferred_is_empty() {
        let resolution = classify(Source::deferred(async { Source::deferred(async { "x" }) }));
        assert!(block_on(resolution.resolve()).unwrap().is_empty());
    }

    #[test]
    fn test_deferred_rejection_is_failure() {
        let resolution = classify(Source::try_deferred(async {
            Err::<&str, _>(anyhow::anyhow!("rejected"))
        }));
        let err = block_on(resolution.resolve()).unwrap_err();
        assert_eq!(err.to_string(), "rejected");
    }

    #[test]
    fn test_factory_invoked_once_per_classification() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = Source::factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "c"
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let resolution = classify(source);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(text_of(resolution).as_deref(), Some("c"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_returning_deferred() {
        let resolution = classify(Source::factory(|| Source::deferred(async { "later" })));
        assert!(!resolution.is_ready());
        assert_eq!(text_of(resolution).as_deref(), Some("later"));
    }

    #[test]
    fn test_factory_returning_deferred_unsupported() {
        let resolution = classify(Source::factory(|| Source::deferred(async { Source::other(456) })));
        assert!(block_on(resolution.resolve()).unwrap().is_empty());
    }

    #[test]
    fn test_factory_returning_factory_is_not_reinvoked() {
        let inner_calls = Arc::new(AtomicUsize::new(0));
        let counter = inner_calls.clone();
        let resolution = classify(Source::factory(move || {
            let counter = counter.clone();
            Source::factory(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "never"
            })
        }));

        assert!(matches!(resolution, Resolution::Ready(Ok(Content::Empty))));
        assert_eq!(inner_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_factory_error_is_failure() {
        let resolution = classify(Source::try_factory(|| {
            Err::<&str, _>(anyhow::anyhow!("factory exploded"))
        }));
        match resolution {
            Resolution::Ready(Err(failure)) => assert_eq!(failure.to_string(), "factory exploded"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_other_is_empty() {
        let resolution = classify(Source::other(vec![1, 2, 3]));
        assert!(matches!(resolution, Resolution::Ready(Ok(Content::Empty))));
    }
}
