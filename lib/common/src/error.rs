use std::error::Error;
use std::io;

/// An error raised by a federation member while answering a query or an estimate request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl SourceError {
    /// Builds an error from an arbitrary underlying error.
    #[inline]
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }

    /// Builds an error from a printable error message.
    #[inline]
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Other(msg.into().into())
    }
}

/// An error raised while consuming a solution stream.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StreamError {
    /// `next()` was called without a preceding successful `has_next()`.
    #[error("the stream is exhausted")]
    Exhausted,
    /// The stream was used after `close()`.
    #[error("the stream is closed")]
    Closed,
    /// The underlying source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}
