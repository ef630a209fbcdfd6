use crate::error::QueryEvaluationError;
use crate::eval::evaluate;
use crate::planner::FedraPlanner;
use crate::rewriting::GraphPatternRewriter;
use fedra_common::{BoxSolutionStream, SourceRef};
use fedra_logical::planner::{GreedyJoinOrderPlanner, JoinOrderPlanner};
use fedra_logical::PlanArena;
use fedra_model::{Solution, TriplePattern, Variable};
use fedra_physical::VecSolutionStream;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// The registered members of a federation, in registration order.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceRef>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source`, replacing a previously registered source of the same name.
    pub fn register(&mut self, source: SourceRef) {
        self.sources.retain(|s| s.name() != source.name());
        self.sources.push(source);
    }

    /// Looks a source up by name.
    pub fn get(&self, name: &str) -> Option<&SourceRef> {
        self.sources.iter().find(|s| s.name() == name)
    }

    /// Iterates over the sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceRef> {
        self.sources.iter()
    }

    /// The number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns whether no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// The result of evaluating a query.
pub enum QueryOutcome {
    /// The solutions of a SELECT query.
    Solutions(BoxSolutionStream),
    /// The answer of an ASK query.
    Boolean(bool),
}

/// An instance of the Fedra federation engine.
///
/// An instance owns the source registry and the planner and turns queries into solution
/// streams: patterns are split across the registered sources, join-ordered over the join graph,
/// and executed bottom-up with concurrent hash joins.
pub struct FedraInstance {
    sources: SourceRegistry,
    planner: FedraPlanner,
}

impl FedraInstance {
    /// Creates an instance with the default greedy join-order planner.
    pub fn new() -> Self {
        Self::with_join_order_planner(Arc::new(GreedyJoinOrderPlanner::new()))
    }

    /// Creates an instance with a custom join-order planner.
    pub fn with_join_order_planner(join_order: Arc<dyn JoinOrderPlanner>) -> Self {
        Self {
            sources: SourceRegistry::new(),
            planner: FedraPlanner::new(join_order),
        }
    }

    /// Registers a federation member.
    pub fn register_source(&mut self, source: SourceRef) {
        self.sources.register(source);
    }

    /// The registered sources.
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Evaluates a conjunction of triple patterns across the federation.
    pub async fn execute_patterns(
        &self,
        patterns: &[TriplePattern],
    ) -> Result<BoxSolutionStream, QueryEvaluationError> {
        if patterns.is_empty() {
            // The empty conjunction has exactly one solution binding nothing.
            let variables: Arc<[Variable]> = Vec::new().into();
            let solution = Solution::empty(Arc::clone(&variables));
            return Ok(Box::new(VecSolutionStream::new(variables, vec![solution])));
        }

        let mut arena = PlanArena::new();
        match self
            .planner
            .plan_patterns(&mut arena, patterns, &self.sources)
            .await?
        {
            Some(root) => {
                arena.debug_verify(root);
                debug!(plan = %arena.display(root), "executing federated plan");
                evaluate(&arena, root, &self.sources).await
            }
            None => Ok(empty_stream_for(patterns)),
        }
    }

    /// Evaluates a SPARQL SELECT or ASK query across the federation.
    pub async fn query(&self, query: &str) -> Result<QueryOutcome, QueryEvaluationError> {
        let parsed = spargebra::Query::parse(query, None)?;
        match &parsed {
            spargebra::Query::Select { pattern, .. } => {
                let stream = self.evaluate_pattern(pattern, false).await?;
                Ok(QueryOutcome::Solutions(stream))
            }
            spargebra::Query::Ask { pattern, .. } => {
                let mut stream = self.evaluate_pattern(pattern, true).await?;
                let answer = stream.has_next().await?;
                stream.close().await?;
                Ok(QueryOutcome::Boolean(answer))
            }
            spargebra::Query::Construct { .. } => {
                Err(QueryEvaluationError::unsupported("CONSTRUCT"))
            }
            spargebra::Query::Describe { .. } => {
                Err(QueryEvaluationError::unsupported("DESCRIBE"))
            }
        }
    }

    async fn evaluate_pattern(
        &self,
        pattern: &spargebra::algebra::GraphPattern,
        ask: bool,
    ) -> Result<BoxSolutionStream, QueryEvaluationError> {
        let mut arena = PlanArena::new();
        let rewriter = GraphPatternRewriter::new(&self.planner, &self.sources);
        match rewriter.rewrite(&mut arena, pattern).await? {
            Some(root) => {
                if ask {
                    // Existence is all that matters: one solution suffices.
                    arena.set_ask(root, true);
                }
                arena.debug_verify(root);
                debug!(plan = %arena.display(root), "executing federated plan");
                evaluate(&arena, root, &self.sources).await
            }
            None => {
                let variables: Arc<[Variable]> = Vec::new().into();
                Ok(Box::new(VecSolutionStream::empty(variables)))
            }
        }
    }
}

impl Default for FedraInstance {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_stream_for(patterns: &[TriplePattern]) -> BoxSolutionStream {
    let mut variables = BTreeSet::new();
    for pattern in patterns {
        fedra_model::collect_pattern_variables(pattern, &mut variables);
    }
    let variables: Arc<[Variable]> = variables.into_iter().collect::<Vec<_>>().into();
    Box::new(VecSolutionStream::empty(variables))
}
