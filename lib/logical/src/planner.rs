use crate::arena::{NodeId, PlanArena};
use crate::error::PlanError;
use crate::graph::JoinGraph;
use crate::node::PlanKind;
use crate::subset::IndexedSubset;
use fedra_common::Cardinality;
use fedra_model::{NamedNodePattern, TermPattern, TriplePattern};
use tracing::debug;

/// Decides the join order for one join-connected component of a [JoinGraph].
///
/// Implementations receive the component as an [IndexedSubset] and must return a single plan
/// node covering exactly its members. The sub-path aggregation treats this as opaque, so
/// planners are freely swappable.
pub trait JoinOrderPlanner: Send + Sync {
    /// Plans the join order over the members of `subset` and returns the replacement node.
    fn plan(
        &self,
        arena: &mut PlanArena,
        graph: &JoinGraph,
        subset: &IndexedSubset,
    ) -> Result<NodeId, PlanError>;
}

/// A greedy, cardinality-driven [JoinOrderPlanner].
///
/// Starts with the cheapest member, then repeatedly joins the cheapest member that shares a
/// valid join edge with the part already planned. The result is a left-deep join tree over the
/// component.
#[derive(Debug, Default)]
pub struct GreedyJoinOrderPlanner;

impl GreedyJoinOrderPlanner {
    /// Creates a [GreedyJoinOrderPlanner].
    pub fn new() -> Self {
        Self {}
    }
}

impl JoinOrderPlanner for GreedyJoinOrderPlanner {
    fn plan(
        &self,
        arena: &mut PlanArena,
        graph: &JoinGraph,
        subset: &IndexedSubset,
    ) -> Result<NodeId, PlanError> {
        let mut remaining: Vec<usize> = subset.iter().collect();
        let Some(first_position) = remaining
            .iter()
            .enumerate()
            .min_by_key(|(_, &index)| node_cost(arena, graph.node(index)))
            .map(|(position, _)| position)
        else {
            return Err(PlanError::NotConnected(Vec::new()));
        };

        let mut used = vec![remaining.remove(first_position)];
        let mut current = graph.node(used[0]);

        while !remaining.is_empty() {
            // The cheapest candidate joinable with what has been planned so far.
            let next_position = remaining
                .iter()
                .enumerate()
                .filter(|(_, &candidate)| {
                    used.iter().any(|&done| graph.are_joinable(done, candidate))
                })
                .min_by_key(|(_, &candidate)| node_cost(arena, graph.node(candidate)))
                .map(|(position, _)| position);
            let Some(position) = next_position else {
                // No joinable member left although the component is not exhausted.
                return Err(PlanError::NotConnected(subset.iter().collect()));
            };

            let index = remaining.remove(position);
            let next = graph.node(index);
            let joined = arena.join(current, next)?;
            arena.set_cardinality(joined, estimate_join_cardinality(arena, current, next));
            used.push(index);
            current = joined;
        }

        debug!(component = ?subset, root = %current, "planned join component");
        Ok(current)
    }
}

fn node_cost(arena: &PlanArena, id: NodeId) -> u64 {
    if let Some(cardinality) = arena.cardinality(id) {
        return cardinality.value;
    }
    // Leaves without statistics are still ordered by the shape of their patterns.
    match arena.kind(id) {
        PlanKind::Leaf(leaf) => leaf
            .query
            .patterns()
            .iter()
            .map(|p| heuristic_pattern_cardinality(p).value)
            .min()
            .unwrap_or(u64::MAX),
        _ => u64::MAX,
    }
}

/// Estimates the cardinality of joining `left` and `right`.
///
/// Each shared variable is assumed to cut the cross product by three orders of magnitude. The
/// heuristic matches the one Oxigraph uses for join reordering; it is deliberately crude and
/// only used to compare candidates against each other.
pub fn estimate_join_cardinality(arena: &PlanArena, left: NodeId, right: NodeId) -> Cardinality {
    let shared = arena
        .result_vars(left)
        .intersection(&arena.result_vars(right))
        .count();
    let value = node_cost(arena, left)
        .saturating_mul(node_cost(arena, right))
        .saturating_div(1_000_u64.saturating_pow(u32::try_from(shared).unwrap_or(u32::MAX)));
    Cardinality::estimated(value)
}

/// A shape-based cardinality guess for a single triple pattern.
///
/// Used when a source cannot provide an estimate. The constants order pattern shapes by their
/// typical selectivity; only the relative order matters.
pub fn heuristic_pattern_cardinality(pattern: &TriplePattern) -> Cardinality {
    let subject_bound = matches!(
        &pattern.subject,
        TermPattern::NamedNode(_) | TermPattern::Literal(_)
    );
    let predicate_bound = matches!(&pattern.predicate, NamedNodePattern::NamedNode(_));
    let object_bound = matches!(
        &pattern.object,
        TermPattern::NamedNode(_) | TermPattern::Literal(_)
    );

    let value = match (subject_bound, predicate_bound, object_bound) {
        (true, true, true) => 1,
        (true, false, true) => 2,
        (true, true, false) => 10,
        (true, false, false) => 100,
        (false, true, true) => 10_000,
        (false, false, true) => 100_000,
        (false, true, false) => 1_000_000,
        (false, false, false) => 1_000_000_000,
    };
    Cardinality::guess(value)
}
