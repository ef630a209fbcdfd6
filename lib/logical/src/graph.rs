use crate::arena::{NodeId, PlanArena};
use crate::subset::IndexedSubset;
use fedra_model::Variable;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// The computed joinability between two plan nodes.
///
/// `join_vars` holds the shared variables usable as join keys. `valid` is false when joining the
/// two nodes is illegal, e.g. when a variable shared between their public sets was projected out
/// of one side's result set: equality on it could then not be enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinInfo {
    /// The shared variables usable as join keys.
    pub join_vars: BTreeSet<Variable>,
    /// Whether joining the two nodes is legal.
    pub valid: bool,
}

impl JoinInfo {
    /// Computes the [JoinInfo] between two plan nodes.
    pub fn compute(arena: &PlanArena, a: NodeId, b: NodeId) -> JoinInfo {
        let sets_a = arena.var_sets(a);
        let sets_b = arena.var_sets(b);

        let shared_public: BTreeSet<Variable> = sets_a
            .public()
            .intersection(&sets_b.public())
            .cloned()
            .collect();
        let join_vars: BTreeSet<Variable> = sets_a
            .result
            .intersection(&sets_b.result)
            .cloned()
            .collect();

        // Every shared variable must be a usable key; a projected-out one poisons the join.
        let valid = shared_public.iter().all(|v| join_vars.contains(v));
        JoinInfo { join_vars, valid }
    }

    /// Returns whether this edge should appear in a join graph.
    pub fn is_edge(&self) -> bool {
        self.valid && !self.join_vars.is_empty()
    }
}

/// An undirected, irreflexive graph of plan nodes connected by valid join edges.
///
/// Nodes are addressed by their index in a fixed, order-preserving index-set, so groups of nodes
/// can be described as [IndexedSubset]s.
pub struct JoinGraph {
    nodes: Vec<NodeId>,
    positions: FxHashMap<NodeId, usize>,
    edges: FxHashMap<(usize, usize), JoinInfo>,
}

impl JoinGraph {
    /// Builds the join graph over `nodes`, computing the [JoinInfo] for every pair and keeping
    /// only valid edges.
    pub fn build(arena: &PlanArena, nodes: Vec<NodeId>) -> Self {
        let positions = nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let mut edges = FxHashMap::default();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let info = JoinInfo::compute(arena, nodes[i], nodes[j]);
                if info.is_edge() {
                    edges.insert((i, j), info);
                }
            }
        }
        Self {
            nodes,
            positions,
            edges,
        }
    }

    /// The number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node at `index`.
    pub fn node(&self, index: usize) -> NodeId {
        self.nodes[index]
    }

    /// All nodes in index order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The index of `id`, if it is part of this graph.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// The join edge between the nodes at `a` and `b`, if one exists. The graph is irreflexive:
    /// `edge(i, i)` is always [None].
    pub fn edge(&self, a: usize, b: usize) -> Option<&JoinInfo> {
        if a == b {
            return None;
        }
        let key = (a.min(b), a.max(b));
        self.edges.get(&key)
    }

    /// Returns whether the nodes at `a` and `b` share a valid join edge.
    pub fn are_joinable(&self, a: usize, b: usize) -> bool {
        self.edge(a, b).is_some()
    }

    /// The subset containing every node of this graph.
    pub fn universe(&self) -> IndexedSubset {
        IndexedSubset::full(self.nodes.len())
    }

    /// Returns whether every member of `subset` is reachable from every other via valid edges
    /// that stay inside `subset`.
    pub fn is_connected(&self, subset: &IndexedSubset) -> bool {
        if subset.is_empty() {
            return true;
        }
        self.connected_pieces(subset).len() == 1
    }

    /// Splits `subset` into its connected pieces (flood fill over the edges restricted to the
    /// subset). Pieces are returned in ascending order of their smallest member.
    pub fn connected_pieces(&self, subset: &IndexedSubset) -> Vec<IndexedSubset> {
        let mut remaining = subset.clone();
        let mut pieces = Vec::new();
        while let Some(seed) = remaining.first() {
            let mut piece = IndexedSubset::empty(subset.universe());
            let mut frontier = vec![seed];
            piece.insert(seed);
            remaining.remove(seed);
            while let Some(current) = frontier.pop() {
                let neighbors: Vec<usize> = remaining
                    .iter()
                    .filter(|&candidate| self.are_joinable(current, candidate))
                    .collect();
                for neighbor in neighbors {
                    piece.insert(neighbor);
                    remaining.remove(neighbor);
                    frontier.push(neighbor);
                }
            }
            pieces.push(piece);
        }
        pieces
    }
}
