use crate::streams::close_streams;
use async_trait::async_trait;
use fedra_common::error::StreamError;
use fedra_common::{BoxSolutionStream, SolutionStream};
use fedra_model::{Solution, Variable};
use std::sync::Arc;

/// Concatenates several streams into one, used to execute unions.
///
/// Children are drained in order and closed as soon as they are exhausted. Solutions are
/// re-mapped onto the union schema, so children may have differing variable sets.
pub struct ChainStream {
    variables: Arc<[Variable]>,
    streams: Vec<BoxSolutionStream>,
    position: usize,
}

impl ChainStream {
    /// Creates a chained stream over `streams` with the given union schema.
    pub fn new(variables: Arc<[Variable]>, streams: Vec<BoxSolutionStream>) -> Self {
        Self {
            variables,
            streams,
            position: 0,
        }
    }
}

#[async_trait]
impl SolutionStream for ChainStream {
    fn variables(&self) -> &[Variable] {
        &self.variables
    }

    async fn has_next(&mut self) -> Result<bool, StreamError> {
        while let Some(stream) = self.streams.get_mut(self.position) {
            if stream.has_next().await? {
                return Ok(true);
            }
            stream.close().await?;
            self.position += 1;
        }
        Ok(false)
    }

    async fn next(&mut self) -> Result<Solution, StreamError> {
        if !self.has_next().await? {
            return Err(StreamError::Exhausted);
        }
        match self.streams.get_mut(self.position) {
            Some(stream) => {
                let solution = stream.next().await?;
                Ok(solution.map_onto(Arc::clone(&self.variables)))
            }
            None => Err(StreamError::Exhausted),
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        let remaining = self.streams.iter_mut().skip(self.position);
        let result = close_streams(remaining).await;
        self.position = self.streams.len();
        result
    }

    fn ready_count(&self) -> usize {
        self.streams
            .get(self.position)
            .map_or(0, |stream| stream.ready_count())
    }

    fn is_optional(&self) -> bool {
        !self.streams.is_empty() && self.streams.iter().all(|s| s.is_optional())
    }

    fn is_async(&self) -> bool {
        self.streams.iter().any(|s| s.is_async())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::VecSolutionStream;
    use fedra_model::Term;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn term(value: &str) -> Term {
        Term::NamedNode(fedra_model::NamedNode::new_unchecked(format!(
            "http://example.com/{value}"
        )))
    }

    #[tokio::test]
    async fn chains_children_onto_the_union_schema() {
        let left_schema: Arc<[Variable]> = vec![var("x")].into();
        let right_schema: Arc<[Variable]> = vec![var("y")].into();
        let union_schema: Arc<[Variable]> = vec![var("x"), var("y")].into();

        let left = VecSolutionStream::new(
            Arc::clone(&left_schema),
            vec![Solution::new(left_schema, vec![Some(term("a"))])],
        );
        let right = VecSolutionStream::new(
            Arc::clone(&right_schema),
            vec![Solution::new(right_schema, vec![Some(term("b"))])],
        );

        let mut chain = ChainStream::new(union_schema, vec![Box::new(left), Box::new(right)]);
        let mut collected = Vec::new();
        while chain.has_next().await.unwrap() {
            collected.push(chain.next().await.unwrap());
        }

        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].get("x"), Some(&term("a")));
        assert_eq!(collected[0].get("y"), None);
        assert_eq!(collected[1].get("y"), Some(&term("b")));
        chain.close().await.unwrap();
    }
}
