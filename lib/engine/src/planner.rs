use crate::engine::SourceRegistry;
use crate::error::QueryEvaluationError;
use fedra_logical::aggregation::{plan_components, reduce_graph, SubPathAggregator};
use fedra_logical::graph::JoinGraph;
use fedra_logical::planner::JoinOrderPlanner;
use fedra_logical::{IndexedSubset, NodeId, PlanArena};
use fedra_common::{Cardinality, ReliabilityTier, SourceQuery};
use fedra_model::TriplePattern;
use std::sync::Arc;
use tracing::debug;

/// Plans a basic graph pattern across the federation.
///
/// The pipeline: probe every source for every pattern, push exclusive groups down whole, union
/// multi-source patterns, build the join graph over the resulting members, aggregate the
/// per-source coverage paths into shared components, plan each component, and join-order the
/// reduced graph. Disconnected parts of the reduced graph are combined with cross products.
pub struct FedraPlanner {
    join_order: Arc<dyn JoinOrderPlanner>,
}

impl FedraPlanner {
    /// Creates a planner delegating join ordering to `join_order`.
    pub fn new(join_order: Arc<dyn JoinOrderPlanner>) -> Self {
        Self { join_order }
    }

    /// Plans `patterns` over the registered sources.
    ///
    /// Returns [None] when some pattern is answerable by no source, in which case the whole
    /// conjunction is statically empty.
    pub async fn plan_patterns(
        &self,
        arena: &mut PlanArena,
        patterns: &[TriplePattern],
        sources: &SourceRegistry,
    ) -> Result<Option<NodeId>, QueryEvaluationError> {
        debug_assert!(!patterns.is_empty());

        // Source selection: which member can answer which pattern?
        let mut relevant: Vec<Vec<(String, Cardinality)>> = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let query = SourceQuery::Pattern(pattern.clone());
            let mut candidates = Vec::new();
            for source in sources.iter() {
                let cardinality = source.estimate(&query).await?;
                if !cardinality.is_empty() {
                    candidates.push((source.name().to_owned(), cardinality));
                }
            }
            if candidates.is_empty() {
                debug!(%pattern, "pattern is answerable by no source");
                return Ok(None);
            }
            relevant.push(candidates);
        }

        let members = self.build_members(arena, patterns, &relevant, sources).await?;
        let root = self.join_members(arena, members)?;
        Ok(Some(root))
    }

    /// Builds one plan member per evaluation unit, together with the names of the sources that
    /// contribute to it.
    async fn build_members(
        &self,
        arena: &mut PlanArena,
        patterns: &[TriplePattern],
        relevant: &[Vec<(String, Cardinality)>],
        sources: &SourceRegistry,
    ) -> Result<Vec<(NodeId, Vec<String>)>, QueryEvaluationError> {
        let mut members = Vec::new();

        // Patterns with a single capable source form exclusive groups, pushed down whole.
        for source in sources.iter() {
            let mut exclusive: Vec<(TriplePattern, Cardinality)> = Vec::new();
            for (pattern, candidates) in patterns.iter().zip(relevant) {
                if let [(name, cardinality)] = candidates.as_slice() {
                    if name == source.name() {
                        exclusive.push((pattern.clone(), *cardinality));
                    }
                }
            }
            match exclusive.as_slice() {
                [] => {}
                [(pattern, cardinality)] => {
                    let leaf = arena.leaf(source.name(), SourceQuery::Pattern(pattern.clone()));
                    arena.set_cardinality(leaf, *cardinality);
                    members.push((leaf, vec![source.name().to_owned()]));
                }
                _ => {
                    let group: Vec<TriplePattern> =
                        exclusive.iter().map(|(p, _)| p.clone()).collect();
                    let query = SourceQuery::Conjunction(group);
                    let cardinality = source.estimate(&query).await?;
                    let leaf = arena.leaf(source.name(), query);
                    arena.set_cardinality(leaf, cardinality);
                    members.push((leaf, vec![source.name().to_owned()]));
                }
            }
        }

        // Patterns several sources can answer become unions over per-source leaves.
        for (pattern, candidates) in patterns.iter().zip(relevant) {
            if candidates.len() < 2 {
                continue;
            }
            let mut leaves = Vec::new();
            let mut names = Vec::new();
            let mut total = 0_u64;
            let mut tier = ReliabilityTier::Exact;
            for (name, cardinality) in candidates {
                let leaf = arena.leaf(name, SourceQuery::Pattern(pattern.clone()));
                arena.set_cardinality(leaf, *cardinality);
                leaves.push(leaf);
                names.push(name.clone());
                total = total.saturating_add(cardinality.value);
                tier = tier.min(cardinality.tier);
            }
            let union = arena.union(leaves)?;
            arena.set_cardinality(union, Cardinality { value: total, tier });
            members.push((union, names));
        }

        Ok(members)
    }

    /// Joins the members into a single plan node.
    fn join_members(
        &self,
        arena: &mut PlanArena,
        members: Vec<(NodeId, Vec<String>)>,
    ) -> Result<NodeId, QueryEvaluationError> {
        if let [(only, _)] = members.as_slice() {
            return Ok(*only);
        }

        let nodes: Vec<NodeId> = members.iter().map(|(id, _)| *id).collect();
        let graph = JoinGraph::build(arena, nodes);

        // Candidate paths: the connected pieces of each source's coverage area.
        let mut paths = Vec::new();
        for source_name in members.iter().flat_map(|(_, names)| names) {
            let coverage = IndexedSubset::from_indices(
                graph.len(),
                members
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, names))| names.iter().any(|n| n == source_name))
                    .map(|(index, _)| index),
            );
            for piece in graph.connected_pieces(&coverage) {
                if !paths.contains(&piece) {
                    paths.push(piece);
                }
            }
        }

        let components = SubPathAggregator::aggregate(&graph, &paths)?;
        let planned = plan_components(arena, &graph, components, self.join_order.as_ref())?;
        let reduced = reduce_graph(arena, &graph, &planned, &paths);
        debug!(
            members = graph.len(),
            components = planned.len(),
            reduced_nodes = reduced.graph.len(),
            reduced_paths = reduced.paths.len(),
            "reduced federated join graph"
        );

        // Join-order every connected piece of the reduced partition, then cross-join the
        // pieces.
        let mut piece_roots = Vec::new();
        for piece in reduced.graph.connected_pieces(&reduced.core) {
            let root = match piece.first() {
                Some(index) if piece.len() == 1 => reduced.graph.node(index),
                _ => self.join_order.plan(arena, &reduced.graph, &piece)?,
            };
            piece_roots.push(root);
        }

        let mut iter = piece_roots.into_iter();
        let Some(mut root) = iter.next() else {
            return Err(QueryEvaluationError::unsupported("empty join graph"));
        };
        for next in iter {
            root = arena.cartesian(root, next)?;
        }
        Ok(root)
    }
}
