use fedra_common::{Cardinality, SourceQuery};
use fedra_logical::{NodeId, PlanArena};
use fedra_model::{NamedNode, NamedNodePattern, TermPattern, TriplePattern, Variable};

pub fn var(name: &str) -> Variable {
    Variable::new_unchecked(name)
}

fn term_pattern(value: &str) -> TermPattern {
    match value.strip_prefix('?') {
        Some(name) => TermPattern::Variable(var(name)),
        None => TermPattern::NamedNode(NamedNode::new_unchecked(format!(
            "http://example.com/{value}"
        ))),
    }
}

/// Builds a triple pattern from a compact `"?s name ?o"`-style notation.
pub fn pattern(subject: &str, predicate: &str, object: &str) -> TriplePattern {
    let predicate = match predicate.strip_prefix('?') {
        Some(name) => NamedNodePattern::Variable(var(name)),
        None => NamedNodePattern::NamedNode(NamedNode::new_unchecked(format!(
            "http://example.com/{predicate}"
        ))),
    };
    TriplePattern {
        subject: term_pattern(subject),
        predicate,
        object: term_pattern(object),
    }
}

/// Creates a leaf for `source` with a cardinality, so the greedy planner has costs to work with.
pub fn leaf(arena: &mut PlanArena, source: &str, p: TriplePattern, rows: u64) -> NodeId {
    let id = arena.leaf(source, SourceQuery::Pattern(p));
    arena.set_cardinality(id, Cardinality::estimated(rows));
    id
}
