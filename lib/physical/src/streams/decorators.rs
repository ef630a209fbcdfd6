//! Stream-to-stream transformations.
//!
//! Decorators layer projection, filtering, distinctness and limiting around a source stream.
//! Each decorator forwards the `optional`/`distinct`/`is_async` flags of its source unless it
//! actively changes that property.

use async_trait::async_trait;
use fedra_common::error::StreamError;
use fedra_common::{BoxSolutionStream, SolutionStream};
use fedra_model::{Solution, Variable};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// A predicate applied by a [FilterStream].
pub type SolutionPredicate = Arc<dyn Fn(&Solution) -> bool + Send + Sync>;

/// Restricts every solution to a fixed set of variables.
pub struct ProjectionStream {
    inner: BoxSolutionStream,
    variables: Arc<[Variable]>,
}

impl ProjectionStream {
    /// Creates a projection of `inner` onto `projection`.
    pub fn new(inner: BoxSolutionStream, projection: Vec<Variable>) -> Self {
        Self {
            inner,
            variables: projection.into(),
        }
    }
}

#[async_trait]
impl SolutionStream for ProjectionStream {
    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        self.inner.has_next().await
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        let solution = self.inner.next().await?;
        Ok(solution.map_onto(Arc::clone(&self.variables)))
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await
    }

    fn ready_count(&self) -> usize {
        self.inner.ready_count()
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }

    fn is_distinct(&self) -> bool {
        self.inner.is_distinct()
    }

    fn limit(&self) -> Option<u64> {
        self.inner.limit()
    }

    fn is_async(&self) -> bool {
        self.inner.is_async()
    }
}

/// Drops solutions that fail a predicate.
pub struct FilterStream {
    inner: BoxSolutionStream,
    predicate: SolutionPredicate,
    peeked: Option<Solution>,
}

impl FilterStream {
    /// Creates a filter over `inner`.
    pub fn new(inner: BoxSolutionStream, predicate: SolutionPredicate) -> Self {
        Self {
            inner,
            predicate,
            peeked: None,
        }
    }
}

#[async_trait]
impl SolutionStream for FilterStream {
    fn variables(&self) -> &[Variable] {
        self.inner.variables()
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        while self.inner.has_next().await? {
            let candidate = self.inner.next().await?;
            if (self.predicate)(&candidate) {
                self.peeked = Some(candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        if self.peeked.is_none() && !self.has_next().await? {
            return Err(StreamError::Exhausted);
        }
        self.peeked.take().ok_or(StreamError::Exhausted)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await
    }

    fn ready_count(&self) -> usize {
        usize::from(self.peeked.is_some())
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }

    fn is_distinct(&self) -> bool {
        self.inner.is_distinct()
    }

    fn limit(&self) -> Option<u64> {
        self.inner.limit()
    }

    fn is_async(&self) -> bool {
        self.inner.is_async()
    }
}

/// Removes duplicate solutions.
pub struct DistinctStream {
    inner: BoxSolutionStream,
    seen: FxHashSet<Solution>,
    peeked: Option<Solution>,
}

impl DistinctStream {
    /// Creates a duplicate-free view of `inner`.
    pub fn new(inner: BoxSolutionStream) -> Self {
        Self {
            inner,
            seen: FxHashSet::default(),
            peeked: None,
        }
    }
}

#[async_trait]
impl SolutionStream for DistinctStream {
    fn variables(&self) -> &[Variable] {
        self.inner.variables()
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        while self.inner.has_next().await? {
            let candidate = self.inner.next().await?;
            if self.seen.insert(candidate.clone()) {
                self.peeked = Some(candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        if self.peeked.is_none() && !self.has_next().await? {
            return Err(StreamError::Exhausted);
        }
        self.peeked.take().ok_or(StreamError::Exhausted)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.seen.clear();
        self.inner.close().await
    }

    fn ready_count(&self) -> usize {
        usize::from(self.peeked.is_some())
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }

    fn is_distinct(&self) -> bool {
        // This is the property this decorator establishes, whatever the source reports.
        true
    }

    fn limit(&self) -> Option<u64> {
        self.inner.limit()
    }

    fn is_async(&self) -> bool {
        self.inner.is_async()
    }
}

/// Stops after a fixed number of solutions.
pub struct LimitStream {
    inner: BoxSolutionStream,
    limit: u64,
    emitted: u64,
}

impl LimitStream {
    /// Creates a view of `inner` truncated to `limit` solutions.
    pub fn new(inner: BoxSolutionStream, limit: u64) -> Self {
        Self {
            inner,
            limit,
            emitted: 0,
        }
    }
}

#[async_trait]
impl SolutionStream for LimitStream {
    fn variables(&self) -> &[Variable] {
        self.inner.variables()
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        if self.emitted >= self.limit {
            return Ok(false);
        }
        self.inner.has_next().await
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        if self.emitted >= self.limit {
            return Err(StreamError::Exhausted);
        }
        let solution = self.inner.next().await?;
        self.emitted += 1;
        Ok(solution)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await
    }

    fn ready_count(&self) -> usize {
        let remaining =
            usize::try_from(self.limit.saturating_sub(self.emitted)).unwrap_or(usize::MAX);
        remaining.min(self.inner.ready_count())
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }

    fn is_distinct(&self) -> bool {
        self.inner.is_distinct()
    }

    fn limit(&self) -> Option<u64> {
        Some(match self.inner.limit() {
            Some(inner_limit) => inner_limit.min(self.limit),
            None => self.limit,
        })
    }

    fn is_async(&self) -> bool {
        self.inner.is_async()
    }
}

/// Marks a stream as optional without touching its solutions.
pub struct OptionalStream {
    inner: BoxSolutionStream,
}

impl OptionalStream {
    /// Flags `inner` as optional.
    pub fn new(inner: BoxSolutionStream) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SolutionStream for OptionalStream {
    fn variables(&self) -> &[Variable] {
        self.inner.variables()
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        self.inner.has_next().await
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        self.inner.next().await
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.inner.close().await
    }

    fn ready_count(&self) -> usize {
        self.inner.ready_count()
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn is_distinct(&self) -> bool {
        self.inner.is_distinct()
    }

    fn limit(&self) -> Option<u64> {
        self.inner.limit()
    }

    fn is_async(&self) -> bool {
        self.inner.is_async()
    }
}
