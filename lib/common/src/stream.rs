use crate::error::StreamError;
use async_trait::async_trait;
use fedra_model::{Solution, Variable};
use std::time::Duration;

/// A pull-based, closeable cursor over [Solution]s.
///
/// Every operator of the engine consumes and produces this protocol. A stream is tied to a fixed
/// set of variables chosen at construction time and is consumed exactly once, front to back:
///
/// 1. `has_next()` reports whether another solution is available. For asynchronous streams the
///    call may suspend until a producer delivers data or the source is exhausted. Calling it
///    repeatedly has no side effect beyond that wait.
/// 2. `next()` returns the next solution. Calling it without a preceding successful `has_next()`
///    is a consumer bug and fails with [StreamError::Exhausted].
/// 3. `close()` releases resources and closes wrapped streams. It should be idempotent and must
///    be safe after partial consumption or after an error.
#[async_trait]
pub trait SolutionStream: Send {
    /// The variables of this stream, fixed at construction. Order is irrelevant.
    fn variables(&self) -> &[Variable];

    /// Returns whether another solution is available, waiting for asynchronous producers if
    /// necessary.
    async fn has_next(&mut self) -> Result<bool, StreamError>;

    /// Like `has_next`, but gives up after `timeout`.
    ///
    /// Returns [None] if the deadline elapsed before an answer was available. Useful for polling
    /// without blocking indefinitely.
    async fn has_next_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<bool>, StreamError> {
        match tokio::time::timeout(timeout, self.has_next()).await {
            Ok(available) => available.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Returns the next solution.
    async fn next(&mut self) -> Result<Solution, StreamError>;

    /// Releases all resources held by this stream and closes wrapped streams.
    ///
    /// When several wrapped streams fail to close, the first failure is surfaced and the others
    /// are logged; none are silently dropped.
    async fn close(&mut self) -> Result<(), StreamError>;

    /// A best-effort, non-blocking lower bound on how many solutions can be produced without
    /// waiting. Purely synchronous wrappers may report 0.
    fn ready_count(&self) -> usize {
        0
    }

    /// Whether this stream may legally close without emitting an otherwise expected solution.
    fn is_optional(&self) -> bool {
        false
    }

    /// Whether the solutions of this stream are known to be duplicate-free.
    fn is_distinct(&self) -> bool {
        false
    }

    /// The maximum number of solutions this stream emits, if limited.
    fn limit(&self) -> Option<u64> {
        None
    }

    /// Whether solutions are produced by concurrent producers.
    fn is_async(&self) -> bool {
        false
    }
}

/// An owned, dynamically typed [SolutionStream].
pub type BoxSolutionStream = Box<dyn SolutionStream>;
