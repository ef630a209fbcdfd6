//! Sub-path aggregation.
//!
//! Candidate join paths (connected subsets of the join graph, typically one per source coverage
//! area) overlap wherever several sources can answer the same patterns. Aggregation turns those
//! overlaps into a pairwise-disjoint partition of shared components, each of which can be join-
//! planned once and reused by every path containing it.

use crate::arena::{NodeId, PlanArena};
use crate::error::PlanError;
use crate::graph::JoinGraph;
use crate::planner::JoinOrderPlanner;
use crate::subset::IndexedSubset;
use tracing::debug;

/// Aggregates candidate join paths into a disjoint partition of shared components.
pub struct SubPathAggregator<'a> {
    graph: &'a JoinGraph,
    components: Vec<IndexedSubset>,
}

impl<'a> SubPathAggregator<'a> {
    /// Creates an aggregator over `graph`.
    pub fn new(graph: &'a JoinGraph) -> Self {
        Self {
            graph,
            components: Vec::new(),
        }
    }

    /// Aggregates `paths` and returns the final disjoint partition.
    pub fn aggregate(
        graph: &'a JoinGraph,
        paths: &[IndexedSubset],
    ) -> Result<Vec<IndexedSubset>, PlanError> {
        let mut aggregator = Self::new(graph);
        aggregator.add_paths(paths)?;
        aggregator.into_components()
    }

    /// Intersects every pair of `paths` and merges the connected pieces of each intersection
    /// into the running partition.
    pub fn add_paths(&mut self, paths: &[IndexedSubset]) -> Result<(), PlanError> {
        for i in 0..paths.len() {
            for j in (i + 1)..paths.len() {
                let shared = paths[i].intersection(&paths[j]);
                if shared.is_empty() {
                    continue;
                }
                for piece in self.graph.connected_pieces(&shared) {
                    self.add_component(piece);
                }
            }
        }
        self.verify_disjoint()
    }

    /// The current partition.
    pub fn components(&self) -> &[IndexedSubset] {
        &self.components
    }

    /// Finishes aggregation, checking the partition invariants one more time.
    pub fn into_components(self) -> Result<Vec<IndexedSubset>, PlanError> {
        self.verify_disjoint()?;
        self.debug_verify_connected()?;
        debug!(components = self.components.len(), "sub-path aggregation finished");
        Ok(self.components)
    }

    /// Merges one freshly discovered component into the partition.
    ///
    /// A component that partially overlaps a stored one splits the stored one: the overlap
    /// becomes shared, the remainders stay separate. Every stored piece is re-split along graph
    /// connectivity so the partition only ever contains join-connected components.
    fn add_component(&mut self, component: IndexedSubset) {
        let mut pending = vec![component];
        while let Some(current) = pending.pop() {
            if current.is_empty() {
                continue;
            }
            let overlapping = self
                .components
                .iter()
                .position(|stored| !stored.is_disjoint(&current));
            let Some(position) = overlapping else {
                // Disjoint from everything stored so far.
                for piece in self.graph.connected_pieces(&current) {
                    self.components.push(piece);
                }
                continue;
            };

            let stored = self.components.swap_remove(position);
            let overlap = stored.intersection(&current);
            if overlap == stored && overlap == current {
                self.components.push(stored);
                continue;
            }

            for piece in self.graph.connected_pieces(&overlap) {
                self.components.push(piece);
            }
            for piece in self.graph.connected_pieces(&stored.difference(&overlap)) {
                self.components.push(piece);
            }
            // The rest of the new component may overlap further stored components.
            pending.push(current.difference(&overlap));
        }
    }

    /// Disjointness is checked unconditionally: overlapping components would produce silently
    /// wrong query results, not just wasted work.
    fn verify_disjoint(&self) -> Result<(), PlanError> {
        for i in 0..self.components.len() {
            for j in (i + 1)..self.components.len() {
                if !self.components[i].is_disjoint(&self.components[j]) {
                    return Err(PlanError::OverlappingComponents);
                }
            }
        }
        Ok(())
    }

    /// Connectivity of every component is a planning invariant; the check walks the graph and is
    /// compiled out of release builds.
    fn debug_verify_connected(&self) -> Result<(), PlanError> {
        #[cfg(debug_assertions)]
        for component in &self.components {
            if !self.graph.is_connected(component) {
                return Err(PlanError::NotConnected(component.iter().collect()));
            }
        }
        Ok(())
    }
}

/// A component of the final partition together with the plan node that replaces it.
#[derive(Debug, Clone)]
pub struct PlannedComponent {
    /// The graph nodes covered by this component.
    pub nodes: IndexedSubset,
    /// The node standing in for the whole component after planning.
    pub replacement: NodeId,
}

/// Maps every component to a replacement node.
///
/// Single-node components map to that node; larger ones are handed to the pluggable
/// join-order `planner`, which returns one plan node covering the whole component.
pub fn plan_components(
    arena: &mut PlanArena,
    graph: &JoinGraph,
    components: Vec<IndexedSubset>,
    planner: &dyn JoinOrderPlanner,
) -> Result<Vec<PlannedComponent>, PlanError> {
    components
        .into_iter()
        .map(|nodes| {
            let replacement = match nodes.first() {
                // An empty component cannot come out of aggregation.
                None => return Err(PlanError::NotConnected(Vec::new())),
                Some(index) if nodes.len() == 1 => graph.node(index),
                Some(_) => planner.plan(arena, graph, &nodes)?,
            };
            Ok(PlannedComponent { nodes, replacement })
        })
        .collect()
}

/// The outcome of the reduction step: a smaller join graph plus the rewritten candidate paths.
pub struct ReducedJoinGraph {
    /// The graph over the planned replacements and the surviving original nodes.
    pub graph: JoinGraph,
    /// The reduced candidate paths, deduplicated by structural equality.
    pub paths: Vec<IndexedSubset>,
    /// The partition view of the graph: replacements plus originals not covered by any
    /// component. Covers every matched pattern exactly once, so whole-query planning happens
    /// over this subset.
    pub core: IndexedSubset,
}

/// Builds the reduced join graph and rewrites the candidate paths.
///
/// Every planned component that a path fully contains is substituted by the component's
/// replacement node; partially contained components leave the path unchanged. Duplicate reduced
/// paths are removed.
pub fn reduce_graph(
    arena: &PlanArena,
    graph: &JoinGraph,
    planned: &[PlannedComponent],
    paths: &[IndexedSubset],
) -> ReducedJoinGraph {
    // Substitute fully contained components; everything else keeps its original node.
    let mut reduced_paths: Vec<Vec<NodeId>> = Vec::new();
    let mut kept_originals = IndexedSubset::empty(graph.len());
    for path in paths {
        let mut nodes = Vec::new();
        let mut consumed = IndexedSubset::empty(graph.len());
        for component in planned {
            if component.nodes.is_subset(path) {
                nodes.push(component.replacement);
                consumed = consumed.union(&component.nodes);
            }
        }
        let unchanged = path.difference(&consumed);
        kept_originals = kept_originals.union(&unchanged);
        for index in unchanged.iter() {
            nodes.push(graph.node(index));
        }
        if !reduced_paths
            .iter()
            .any(|existing| paths_structurally_equal(arena, existing, &nodes))
        {
            reduced_paths.push(nodes);
        }
    }

    // Nodes of the reduced graph: each component collapses onto its replacement at the position
    // of its smallest member; nodes not covered by any component, or kept by a path that only
    // partially contains their component, survive as themselves.
    let mut reduced_nodes = Vec::new();
    let mut core_positions = Vec::new();
    for index in 0..graph.len() {
        let covering = planned.iter().find(|c| c.nodes.contains(index));
        match covering {
            Some(component) => {
                if component.nodes.first() == Some(index) {
                    core_positions.push(reduced_nodes.len());
                    reduced_nodes.push(component.replacement);
                }
                if kept_originals.contains(index) {
                    reduced_nodes.push(graph.node(index));
                }
            }
            None => {
                core_positions.push(reduced_nodes.len());
                reduced_nodes.push(graph.node(index));
            }
        }
    }
    let core = IndexedSubset::from_indices(reduced_nodes.len(), core_positions);
    let reduced_graph = JoinGraph::build(arena, reduced_nodes);

    let paths = reduced_paths
        .into_iter()
        .map(|nodes| {
            IndexedSubset::from_indices(
                reduced_graph.len(),
                nodes
                    .iter()
                    .filter_map(|id| reduced_graph.index_of(*id)),
            )
        })
        .collect();

    ReducedJoinGraph {
        graph: reduced_graph,
        paths,
        core,
    }
}

/// Returns whether two paths contain pairwise structurally equal nodes.
fn paths_structurally_equal(arena: &PlanArena, a: &[NodeId], b: &[NodeId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut unmatched: Vec<NodeId> = b.to_vec();
    for &node in a {
        let Some(position) = unmatched
            .iter()
            .position(|&candidate| arena.structural_eq(node, candidate))
        else {
            return false;
        };
        unmatched.swap_remove(position);
    }
    true
}
