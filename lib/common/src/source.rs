use crate::error::SourceError;
use crate::stream::BoxSolutionStream;
use crate::Cardinality;
use async_trait::async_trait;
use fedra_model::{collect_pattern_variables, TriplePattern, Variable};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

/// The unit of work pushed down to a federation member.
///
/// A source either answers a single triple pattern or a conjunction of patterns it can evaluate
/// locally (an exclusive group).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceQuery {
    /// A single triple pattern.
    Pattern(TriplePattern),
    /// A conjunction of triple patterns answered in one round trip.
    Conjunction(Vec<TriplePattern>),
}

impl SourceQuery {
    /// The triple patterns this query matches.
    pub fn patterns(&self) -> &[TriplePattern] {
        match self {
            SourceQuery::Pattern(pattern) => std::slice::from_ref(pattern),
            SourceQuery::Conjunction(patterns) => patterns,
        }
    }

    /// The variables this query can bind.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        for pattern in self.patterns() {
            collect_pattern_variables(pattern, &mut vars);
        }
        vars
    }
}

/// A member of the federation.
///
/// The engine does not know whether a source is local, a remote endpoint, or a wrapped non-RDF
/// system; it only relies on this capability surface.
#[async_trait]
pub trait Source: Debug + Send + Sync {
    /// A stable name identifying this source inside the federation.
    fn name(&self) -> &str;

    /// Evaluates `query` and returns a stream of solutions over the query's variables.
    async fn query(&self, query: SourceQuery) -> Result<BoxSolutionStream, SourceError>;

    /// Returns an approximate row count for `query`.
    ///
    /// Estimates are used only for source selection and cost comparisons and are never required
    /// to be exact.
    async fn estimate(&self, query: &SourceQuery) -> Result<Cardinality, SourceError>;
}

/// A shared handle to a [Source].
pub type SourceRef = Arc<dyn Source>;
