use crate::test_utils::{leaf, pattern, var};
use fedra_common::SourceQuery;
use fedra_logical::{FilterExpr, PlanArena};
use fedra_model::{NamedNode, Term};
use rand::prelude::*;
use std::collections::BTreeSet;

fn vars(names: &[&str]) -> BTreeSet<fedra_model::Variable> {
    names.iter().map(|n| var(n)).collect()
}

#[test]
fn leaf_binds_its_pattern_variables() {
    let mut arena = PlanArena::new();
    let id = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);

    assert_eq!(arena.result_vars(id), vars(&["s", "n"]));
    assert!(arena.input_vars(id).is_empty());
    assert_eq!(arena.strict_result_vars(id), vars(&["s", "n"]));
    assert_eq!(arena.public_vars(id), vars(&["s", "n"]));
}

#[test]
fn join_merges_child_results() {
    let mut arena = PlanArena::new();
    let left = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let right = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 10);
    let join = arena.join(left, right).unwrap();

    assert_eq!(arena.result_vars(join), vars(&["s", "n", "b"]));
    assert!(arena.required_input_vars(join).is_empty());
    arena.verify_invariants(join).unwrap();
}

#[test]
fn filters_on_foreign_variables_become_required_inputs() {
    let mut arena = PlanArena::new();
    let id = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    arena.add_filter(id, FilterExpr::SameTerm(var("n"), var("other")));

    assert_eq!(arena.required_input_vars(id), vars(&["other"]));
    assert_eq!(arena.result_vars(id), vars(&["s", "n"]));
    assert_eq!(arena.public_vars(id), vars(&["s", "n", "other"]));
    arena.verify_invariants(id).unwrap();
}

#[test]
fn optional_children_demote_requirements() {
    let mut arena = PlanArena::new();
    let left = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let right = leaf(&mut arena, "b", pattern("?s", "mbox", "?m"), 10);
    arena.set_optional(right, true);
    let join = arena.join(left, right).unwrap();

    // The optional side's bindings are usable but never required.
    assert!(arena.required_input_vars(join).is_empty());
    assert!(arena.optional_input_vars(join).contains(&var("m")));
    assert_eq!(arena.result_vars(join), vars(&["s", "n", "m"]));
    arena.verify_invariants(join).unwrap();
}

#[test]
fn projection_names_exactly_the_result_vars() {
    let mut arena = PlanArena::new();
    let left = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let right = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 10);
    let join = arena.join(left, right).unwrap();
    arena.set_projection(join, Some(vec![var("s"), var("b")]));

    assert_eq!(arena.result_vars(join), vars(&["s", "b"]));
    arena.verify_invariants(join).unwrap();
}

#[test]
fn structural_equality_ignores_identity() {
    let mut arena = PlanArena::new();
    let a1 = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let b1 = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 10);
    let join1 = arena.join(a1, b1).unwrap();

    let a2 = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 99);
    let b2 = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 1);
    let join2 = arena.join(a2, b2).unwrap();

    // Reflexive, symmetric, hash-consistent; cardinalities are diagnostics and do not count.
    assert!(arena.structural_eq(join1, join1));
    assert!(arena.structural_eq(join1, join2));
    assert!(arena.structural_eq(join2, join1));
    assert_eq!(arena.structural_hash(join1), arena.structural_hash(join2));

    arena.set_distinct(join2, true);
    assert!(!arena.structural_eq(join1, join2));
}

#[test]
fn structural_equality_respects_child_order() {
    let mut arena = PlanArena::new();
    let a = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let b = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 10);
    let ab = arena.join(a, b).unwrap();

    let a2 = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let b2 = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 10);
    let ba = arena.join(b2, a2).unwrap();

    assert!(!arena.structural_eq(ab, ba));
}

#[test]
fn query_after_purge_recomputes_the_same_values() {
    let mut arena = PlanArena::new();
    let left = leaf(&mut arena, "a", pattern("?s", "name", "?n"), 10);
    let right = leaf(&mut arena, "b", pattern("?s", "wrote", "?b"), 10);
    let join = arena.join(left, right).unwrap();

    let before = arena.var_sets(join);
    // A no-op mutation sequence purges the caches without changing semantics.
    arena.set_distinct(join, true);
    arena.set_distinct(join, false);
    assert_eq!(arena.var_sets(join), before);
    arena.verify_invariants(join).unwrap();
}

#[test]
fn render_small_plan() {
    let mut arena = PlanArena::new();
    let left = leaf(&mut arena, "authors", pattern("?s", "name", "?n"), 10);
    let right = leaf(&mut arena, "books", pattern("?s", "wrote", "?b"), 10);
    let join = arena.join(left, right).unwrap();
    arena.set_distinct(join, true);
    arena.set_limit(join, Some(10));

    insta::assert_snapshot!(arena.display(join).to_string(), @r"
    Join [distinct, limit 10]
      Leaf@authors: (?s <http://example.com/name> ?n)
      Leaf@books: (?s <http://example.com/wrote> ?b)
    ");
}

/// Random attach/detach/modifier sequences must never break the §3-style set invariants.
#[test]
fn random_mutations_preserve_invariants() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let mut arena = PlanArena::new();
        let predicates = ["name", "wrote", "title", "year", "cites"];
        let variables = ["s", "n", "b", "t", "y"];

        let mut leaves = Vec::new();
        for i in 0..5 {
            let p = predicates[i % predicates.len()];
            let s = format!("?{}", variables[rng.random_range(0..variables.len())]);
            let o = format!("?{}", variables[rng.random_range(0..variables.len())]);
            leaves.push(leaf(&mut arena, "src", pattern(&s, p, &o), rng.random_range(1..100)));
        }

        let root = arena.union(leaves.clone()).unwrap();
        for _ in 0..20 {
            let target = if rng.random_bool(0.5) {
                root
            } else {
                leaves[rng.random_range(0..leaves.len())]
            };
            match rng.random_range(0..5) {
                0 => arena.set_distinct(target, rng.random_bool(0.5)),
                1 => arena.set_limit(target, rng.random_bool(0.5).then(|| rng.random_range(1..50))),
                2 => {
                    let result: Vec<_> = arena.result_vars(target).into_iter().collect();
                    if result.is_empty() {
                        continue;
                    }
                    let keep = rng.random_range(1..=result.len());
                    arena.set_projection(target, Some(result.into_iter().take(keep).collect()));
                }
                3 => {
                    let candidate = var(variables[rng.random_range(0..variables.len())]);
                    arena.add_filter(
                        target,
                        FilterExpr::Equals(
                            candidate,
                            Term::NamedNode(NamedNode::new_unchecked("http://example.com/x")),
                        ),
                    );
                }
                _ => {
                    let extra = leaf(
                        &mut arena,
                        "src",
                        pattern("?s", "cites", "?o2"),
                        rng.random_range(1..100),
                    );
                    arena.add_child(root, extra).unwrap();
                }
            }
            arena.verify_invariants(root).unwrap();
        }
    }
}

#[test]
fn matched_patterns_cover_the_whole_tree() {
    let mut arena = PlanArena::new();
    let p1 = pattern("?s", "name", "?n");
    let p2 = pattern("?s", "wrote", "?b");
    let left = arena.leaf("a", SourceQuery::Pattern(p1.clone()));
    let right = arena.leaf("b", SourceQuery::Pattern(p2.clone()));
    let join = arena.join(left, right).unwrap();

    let matched = arena.matched_patterns(join);
    assert_eq!(matched.len(), 2);
    assert!(matched.contains(&p1));
    assert!(matched.contains(&p2));
}
