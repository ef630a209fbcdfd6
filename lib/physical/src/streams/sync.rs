use async_trait::async_trait;
use fedra_common::error::StreamError;
use fedra_common::SolutionStream;
use fedra_model::{Solution, Variable};
use std::collections::VecDeque;
use std::sync::Arc;

/// A synchronous stream over an in-memory list of solutions.
///
/// The workhorse for local sources and tests. `ready_count` reports the exact number of
/// remaining solutions since nothing ever blocks.
pub struct VecSolutionStream {
    variables: Arc<[Variable]>,
    solutions: VecDeque<Solution>,
}

impl VecSolutionStream {
    /// Creates a stream emitting `solutions` in order.
    pub fn new(variables: Arc<[Variable]>, solutions: Vec<Solution>) -> Self {
        Self {
            variables,
            solutions: solutions.into(),
        }
    }

    /// Creates a stream that emits nothing.
    pub fn empty(variables: Arc<[Variable]>) -> Self {
        Self::new(variables, Vec::new())
    }
}

#[async_trait]
impl SolutionStream for VecSolutionStream {
    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        Ok(!self.solutions.is_empty())
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        self.solutions.pop_front().ok_or(StreamError::Exhausted)
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.solutions.clear();
        Ok(())
    }

    fn ready_count(&self) -> usize {
        self.solutions.len()
    }
}
