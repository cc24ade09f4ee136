//! Error taxonomy for ordered emission.

use std::fmt;
use std::sync::Arc;

/// A failure raised by user code: a factory that returned `Err`, a deferred value that
/// settled to `Err`, or a sub-stream that yielded `Err`.
///
/// Deferred values are shared between snapshots, so the same failure may be observed
/// by several output streams. The error is therefore reference counted.
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    /// Wrap an error.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    /// Create a failure from a plain message.
    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// Access the underlying error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempt to downcast the underlying error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Error type for output stream operations.
///
/// Unsupported values are not errors: they resolve to nothing and never surface here.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    #[error("Source {index} failed to resolve: {source}")]
    Resolution { index: usize, source: Failure },

    #[error("Sub-stream at source {index} failed: {source}")]
    SubStream { index: usize, source: Failure },

    #[error("Sink error: {0}")]
    Sink(String),
}

impl StreamError {
    /// Position of the failing source in its snapshot, if the error came from one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Resolution { index, .. } | Self::SubStream { index, .. } => Some(*index),
            Self::Sink(_) => None,
        }
    }

    /// The user failure behind this error, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Resolution { source, .. } | Self::SubStream { source, .. } => Some(source),
            Self::Sink(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("upstream timed out")]
    struct UpstreamTimeout;

    #[test]
    fn test_resolution_error_display() {
        let err = StreamError::Resolution {
            index: 3,
            source: Failure::msg("boom"),
        };
        assert_eq!(err.to_string(), "Source 3 failed to resolve: boom");
        assert_eq!(err.index(), Some(3));
    }

    #[test]
    fn test_sink_error_has_no_index() {
        let err = StreamError::Sink("closed".to_string());
        assert_eq!(err.index(), None);
        assert!(err.failure().is_none());
    }

    #[test]
    fn test_failure_downcast() {
        let failure = Failure::new(UpstreamTimeout);
        assert!(failure.downcast_ref::<UpstreamTimeout>().is_some());

        let err = StreamError::SubStream {
            index: 0,
            source: failure.clone(),
        };
        let inner = err.failure().and_then(|f| f.downcast_ref::<UpstreamTimeout>());
        assert!(inner.is_some());
    }

    #[test]
    fn test_failure_alternate_display_includes_context() {
        let failure = Failure::new(anyhow::anyhow!("connection reset").context("fetching cms"));
        assert_eq!(format!("{}", failure), "fetching cms");
        assert_eq!(format!("{:#}", failure), "fetching cms: connection reset");
    }
}
