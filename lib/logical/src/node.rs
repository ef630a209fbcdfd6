use fedra_common::SourceQuery;
use fedra_model::{Solution, Term, Variable};
use std::collections::BTreeSet;

/// The operator implemented by a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlanKind {
    /// A binary join on the shared variables of its two children.
    Join,
    /// The concatenation of the solutions of all children.
    Union,
    /// A cross product of its two children.
    Cartesian,
    /// A query answered directly by one federation member.
    Leaf(LeafQuery),
    /// A single-child wrapper used to carry modifiers.
    Pipe,
    /// An n-ary group of children that still awaits join planning.
    Conjunction,
}

impl PlanKind {
    /// A short label for diagnostics and plan rendering.
    pub fn label(&self) -> &'static str {
        match self {
            PlanKind::Join => "Join",
            PlanKind::Union => "Union",
            PlanKind::Cartesian => "Cartesian",
            PlanKind::Leaf(_) => "Leaf",
            PlanKind::Pipe => "Pipe",
            PlanKind::Conjunction => "Conjunction",
        }
    }
}

/// The query a leaf node pushes down to a federation member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeafQuery {
    /// The name of the source answering the query.
    pub source: String,
    /// The pushed-down pattern or conjunction.
    pub query: SourceQuery,
}

/// The modifier set of a plan node.
///
/// Modifiers change how the solutions of a node are post-processed without changing the node's
/// operator. They take part in structural equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Restricts the result variables to exactly this set.
    pub projection: Option<Vec<Variable>>,
    /// Predicates every emitted solution must satisfy.
    pub filters: Vec<FilterExpr>,
    /// Whether duplicate solutions are removed.
    pub distinct: bool,
    /// The maximum number of solutions to emit.
    pub limit: Option<u64>,
    /// Whether this node is an optional pattern: a consumer must not rely on it emitting
    /// a solution.
    pub optional: bool,
    /// Whether only the existence of a solution matters.
    pub ask: bool,
}

impl Modifiers {
    /// Returns whether no modifier is set.
    pub fn is_empty(&self) -> bool {
        self.projection.is_none()
            && self.filters.is_empty()
            && !self.distinct
            && self.limit.is_none()
            && !self.optional
            && !self.ask
    }
}

/// A predicate over a single solution.
///
/// Only the small filter language the engine can evaluate source-independently is represented
/// here. Full SPARQL expression evaluation is the business of the sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterExpr {
    /// The variable is bound.
    Bound(Variable),
    /// Both variables are bound to the same term.
    SameTerm(Variable, Variable),
    /// The variable is bound to exactly this term.
    Equals(Variable, Term),
}

impl FilterExpr {
    /// Collects the variables this filter reads into `vars`.
    pub fn collect_variables(&self, vars: &mut BTreeSet<Variable>) {
        match self {
            FilterExpr::Bound(v) | FilterExpr::Equals(v, _) => {
                vars.insert(v.clone());
            }
            FilterExpr::SameTerm(a, b) => {
                vars.insert(a.clone());
                vars.insert(b.clone());
            }
        }
    }

    /// Evaluates this filter against a solution. Unbound variables fail the predicate.
    pub fn evaluate(&self, solution: &Solution) -> bool {
        match self {
            FilterExpr::Bound(v) => solution.get(v).is_some(),
            FilterExpr::SameTerm(a, b) => match (solution.get(a), solution.get(b)) {
                (Some(ta), Some(tb)) => ta == tb,
                _ => false,
            },
            FilterExpr::Equals(v, term) => solution.get(v) == Some(term),
        }
    }
}

/// The derived variable sets of a plan node.
///
/// The three base sets are cached on the node and invalidated together; the remaining sets are
/// cheap functions of them, so the set-algebra invariants between all five hold by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSets {
    /// Variables the node needs bound from outside.
    pub required_input: BTreeSet<Variable>,
    /// Variables the node can use when bound from outside but does not require.
    pub optional_input: BTreeSet<Variable>,
    /// Variables the node can bind, after projection if any.
    pub result: BTreeSet<Variable>,
}

impl VarSets {
    /// required-input ∪ optional-input.
    pub fn input(&self) -> BTreeSet<Variable> {
        self.required_input
            .union(&self.optional_input)
            .cloned()
            .collect()
    }

    /// result − input: the variables the node is solely responsible for.
    pub fn strict_result(&self) -> BTreeSet<Variable> {
        let input = self.input();
        self.result.difference(&input).cloned().collect()
    }

    /// result ∪ input: every variable visible at this node.
    pub fn public(&self) -> BTreeSet<Variable> {
        let mut public = self.result.clone();
        public.extend(self.input());
        public
    }
}
