use crate::test_utils::{leaf, pattern, var};
use fedra_logical::graph::{JoinGraph, JoinInfo};
use fedra_logical::{IndexedSubset, PlanArena};
use std::collections::BTreeSet;

#[test]
fn edges_connect_nodes_with_shared_variables() {
    let mut arena = PlanArena::new();
    let a = leaf(&mut arena, "s1", pattern("?s", "name", "?n"), 10);
    let b = leaf(&mut arena, "s1", pattern("?s", "wrote", "?b"), 10);
    let c = leaf(&mut arena, "s2", pattern("?x", "year", "?y"), 10);
    let graph = JoinGraph::build(&arena, vec![a, b, c]);

    let edge = graph.edge(0, 1).unwrap();
    assert_eq!(edge.join_vars, BTreeSet::from([var("s")]));
    assert!(edge.valid);

    assert!(graph.edge(0, 2).is_none());
    assert!(graph.edge(1, 2).is_none());
    assert!(graph.edge(1, 1).is_none(), "the graph is irreflexive");
}

#[test]
fn projected_out_join_variables_invalidate_the_edge() {
    let mut arena = PlanArena::new();
    let a = leaf(&mut arena, "s1", pattern("?s", "name", "?n"), 10);
    let b = leaf(&mut arena, "s1", pattern("?s", "wrote", "?b"), 10);
    // Projecting ?s away on one side makes the join illegal.
    arena.set_projection(b, Some(vec![var("b")]));

    let info = JoinInfo::compute(&arena, a, b);
    assert!(!info.valid);
    assert!(!info.is_edge());

    let graph = JoinGraph::build(&arena, vec![a, b]);
    assert!(graph.edge(0, 1).is_none());
}

#[test]
fn connected_pieces_flood_fill() {
    let mut arena = PlanArena::new();
    // Two islands: {0, 1} share ?s, {2, 3} share ?x.
    let nodes = vec![
        leaf(&mut arena, "s1", pattern("?s", "name", "?n"), 10),
        leaf(&mut arena, "s1", pattern("?s", "wrote", "?b"), 10),
        leaf(&mut arena, "s2", pattern("?x", "year", "?y"), 10),
        leaf(&mut arena, "s2", pattern("?x", "cites", "?z"), 10),
    ];
    let graph = JoinGraph::build(&arena, nodes);

    let pieces = graph.connected_pieces(&graph.universe());
    assert_eq!(pieces.len(), 2);
    assert_eq!(pieces[0], IndexedSubset::from_indices(4, [0, 1]));
    assert_eq!(pieces[1], IndexedSubset::from_indices(4, [2, 3]));

    assert!(graph.is_connected(&pieces[0]));
    assert!(!graph.is_connected(&graph.universe()));

    // Restricting the subset restricts the adjacency: 0 and 1 only connect through each other.
    let restricted = IndexedSubset::from_indices(4, [0, 2]);
    assert_eq!(graph.connected_pieces(&restricted).len(), 2);
}

#[test]
fn index_lookup_is_order_preserving() {
    let mut arena = PlanArena::new();
    let a = leaf(&mut arena, "s1", pattern("?s", "name", "?n"), 10);
    let b = leaf(&mut arena, "s1", pattern("?s", "wrote", "?b"), 10);
    let graph = JoinGraph::build(&arena, vec![b, a]);

    assert_eq!(graph.node(0), b);
    assert_eq!(graph.node(1), a);
    assert_eq!(graph.index_of(a), Some(1));
    assert_eq!(graph.index_of(b), Some(0));
}
