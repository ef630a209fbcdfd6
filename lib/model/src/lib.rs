mod solution;

pub use solution::*;

// Re-export some oxrdf types.
pub use oxrdf::{
    BlankNode, BlankNodeRef, IriParseError, Literal, LiteralRef, NamedNode, NamedNodeRef,
    NamedOrBlankNode, NamedOrBlankNodeRef, Term, TermParseError, TermRef, Triple, TripleRef,
    Variable, VariableNameParseError, VariableRef,
};

// Re-export the pattern types of spargebra. Fedra plans are built over these.
pub use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};

use std::collections::BTreeSet;

/// Collects the variables of `pattern` into `vars`.
///
/// Blank nodes in a pattern act as wildcards and do not contribute a variable.
pub fn collect_pattern_variables(pattern: &TriplePattern, vars: &mut BTreeSet<Variable>) {
    if let TermPattern::Variable(v) = &pattern.subject {
        vars.insert(v.clone());
    }
    if let NamedNodePattern::Variable(v) = &pattern.predicate {
        vars.insert(v.clone());
    }
    if let TermPattern::Variable(v) = &pattern.object {
        vars.insert(v.clone());
    }
}

/// Returns the variables of `pattern` as a fresh set.
pub fn pattern_variables(pattern: &TriplePattern) -> BTreeSet<Variable> {
    let mut vars = BTreeSet::new();
    collect_pattern_variables(pattern, &mut vars);
    vars
}
