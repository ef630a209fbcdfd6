use crate::test_utils::{leaf, pattern};
use fedra_logical::aggregation::{plan_components, reduce_graph, SubPathAggregator};
use fedra_logical::graph::JoinGraph;
use fedra_logical::planner::{GreedyJoinOrderPlanner, JoinOrderPlanner};
use fedra_logical::{IndexedSubset, PlanArena, PlanError, PlanKind};

/// A chain graph: node i shares a variable with node i+1.
fn chain(arena: &mut PlanArena, len: usize, rows: &[u64]) -> JoinGraph {
    let nodes = (0..len)
        .map(|i| {
            leaf(
                arena,
                "src",
                pattern(&format!("?v{i}"), "p", &format!("?v{}", i + 1)),
                rows.get(i).copied().unwrap_or(10),
            )
        })
        .collect();
    JoinGraph::build(arena, nodes)
}

#[test]
fn overlapping_paths_produce_a_disjoint_partition() {
    let mut arena = PlanArena::new();
    let graph = chain(&mut arena, 4, &[10, 20, 30, 40]);

    // Source A covers {0, 1, 2}, source B covers {1, 2, 3}: the shared middle {1, 2} becomes
    // a component of its own.
    let paths = vec![
        IndexedSubset::from_indices(4, [0, 1, 2]),
        IndexedSubset::from_indices(4, [1, 2, 3]),
    ];
    let components = SubPathAggregator::aggregate(&graph, &paths).unwrap();

    assert_eq!(components, vec![IndexedSubset::from_indices(4, [1, 2])]);
    for i in 0..components.len() {
        assert!(graph.is_connected(&components[i]));
        for j in (i + 1)..components.len() {
            assert!(components[i].is_disjoint(&components[j]));
        }
    }
}

#[test]
fn partially_overlapping_components_split_stored_ones() {
    let mut arena = PlanArena::new();
    let graph = chain(&mut arena, 5, &[1, 1, 1, 1, 1]);

    // The first pair shares {1, 2, 3}; the third path then overlaps only {2, 3}, so the stored
    // component must split into {1} and {2, 3}.
    let paths = vec![
        IndexedSubset::from_indices(5, [0, 1, 2, 3]),
        IndexedSubset::from_indices(5, [1, 2, 3, 4]),
        IndexedSubset::from_indices(5, [2, 3]),
    ];
    let mut components = SubPathAggregator::aggregate(&graph, &paths).unwrap();
    components.sort_by_key(|c| c.first());

    assert_eq!(
        components,
        vec![
            IndexedSubset::from_indices(5, [1]),
            IndexedSubset::from_indices(5, [2, 3]),
        ]
    );
}

#[test]
fn identical_paths_collapse_to_one_component() {
    let mut arena = PlanArena::new();
    let graph = chain(&mut arena, 3, &[1, 1, 1]);

    let path = IndexedSubset::from_indices(3, [0, 1, 2]);
    let components = SubPathAggregator::aggregate(&graph, &[path.clone(), path]).unwrap();

    assert_eq!(components, vec![IndexedSubset::from_indices(3, [0, 1, 2])]);
}

#[test]
fn greedy_planner_builds_a_left_deep_join_over_the_component() {
    let mut arena = PlanArena::new();
    let graph = chain(&mut arena, 3, &[100, 1, 50]);

    let planner = GreedyJoinOrderPlanner::new();
    let root = planner.plan(&mut arena, &graph, &graph.universe()).unwrap();

    // All three patterns are answered by the planned tree and the invariants hold.
    assert_eq!(arena.matched_patterns(root).len(), 3);
    arena.verify_invariants(root).unwrap();

    // The cheapest node (index 1) is picked first.
    let mut current = root;
    while let PlanKind::Join = arena.kind(current) {
        current = arena.children(current)[0];
    }
    assert_eq!(current, graph.node(1));
}

#[test]
fn greedy_planner_rejects_disconnected_components() {
    let mut arena = PlanArena::new();
    let nodes = vec![
        leaf(&mut arena, "s1", pattern("?a", "p", "?b"), 10),
        leaf(&mut arena, "s2", pattern("?x", "p", "?y"), 10),
    ];
    let graph = JoinGraph::build(&arena, nodes);

    let planner = GreedyJoinOrderPlanner::new();
    let result = planner.plan(&mut arena, &graph, &graph.universe());
    assert!(matches!(result, Err(PlanError::NotConnected(_))));
}

#[test]
fn reduction_substitutes_planned_components_and_dedups() {
    let mut arena = PlanArena::new();
    let graph = chain(&mut arena, 4, &[10, 20, 30, 40]);
    let paths = vec![
        IndexedSubset::from_indices(4, [0, 1, 2]),
        IndexedSubset::from_indices(4, [1, 2, 3]),
    ];

    let original_patterns: Vec<_> = paths
        .iter()
        .map(|path| {
            let mut patterns = rustc_hash::FxHashSet::default();
            for index in path.iter() {
                patterns.extend(arena.matched_patterns(graph.node(index)));
            }
            patterns
        })
        .collect();

    let components = SubPathAggregator::aggregate(&graph, &paths).unwrap();
    let planner = GreedyJoinOrderPlanner::new();
    let planned = plan_components(&mut arena, &graph, components, &planner).unwrap();
    assert_eq!(planned.len(), 1);

    let reduced = reduce_graph(&arena, &graph, &planned, &paths);

    // {0, 1, 2, 3} collapses to {0, planned(1+2), 3}.
    assert_eq!(reduced.graph.len(), 3);
    assert_eq!(reduced.core, reduced.graph.universe());
    assert_eq!(reduced.paths.len(), 2);

    // Each reduced path answers the same matched triples as its original.
    for (path, expected) in reduced.paths.iter().zip(&original_patterns) {
        let mut patterns = rustc_hash::FxHashSet::default();
        for index in path.iter() {
            patterns.extend(arena.matched_patterns(reduced.graph.node(index)));
        }
        assert_eq!(&patterns, expected);
    }

    // Running the same paths again yields structurally identical reduced paths, which dedup.
    let duplicated: Vec<_> = paths.iter().chain(paths.iter()).cloned().collect();
    let reduced_twice = reduce_graph(&arena, &graph, &planned, &duplicated);
    assert_eq!(reduced_twice.paths.len(), 2);
}

#[test]
fn singleton_components_map_to_their_node() {
    let mut arena = PlanArena::new();
    let graph = chain(&mut arena, 2, &[10, 20]);

    let planner = GreedyJoinOrderPlanner::new();
    let components = vec![IndexedSubset::from_indices(2, [1])];
    let planned = plan_components(&mut arena, &graph, components, &planner).unwrap();

    assert_eq!(planned[0].replacement, graph.node(1));
}

#[test]
fn greedy_planner_falls_back_to_pattern_heuristics() {
    use fedra_common::SourceQuery;

    let mut arena = PlanArena::new();
    // No recorded cardinalities: the shape of the patterns decides the order.
    let bound = arena.leaf("src", SourceQuery::Pattern(pattern("alice", "p", "?x")));
    let open = arena.leaf("src", SourceQuery::Pattern(pattern("?x", "p", "?y")));
    let graph = JoinGraph::build(&arena, vec![open, bound]);

    let planner = GreedyJoinOrderPlanner::new();
    let root = planner.plan(&mut arena, &graph, &graph.universe()).unwrap();

    // The subject-and-predicate-bound pattern is the cheapest start.
    assert_eq!(arena.children(root)[0], bound);
}
