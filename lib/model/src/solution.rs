use oxrdf::{Term, Variable};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single row of variable bindings produced by evaluating a query.
///
/// A solution is immutable from the consumer's point of view. It is backed by an ordered list of
/// variables (the schema, shared between all solutions of one stream) and one optional term per
/// variable. Looking up a variable that is not bound returns [None], never an error.
///
/// Equality and hashing ignore the schema order and unbound entries. Two solutions are equal iff
/// they bind the same variables to the same terms.
#[derive(Clone)]
pub struct Solution {
    variables: Arc<[Variable]>,
    values: Vec<Option<Term>>,
}

impl Solution {
    /// Creates a new [Solution] from a schema and one value per schema variable.
    pub fn new(variables: Arc<[Variable]>, values: Vec<Option<Term>>) -> Self {
        debug_assert_eq!(variables.len(), values.len());
        Self { variables, values }
    }

    /// Creates a [Solution] with no bound variables over the given schema.
    pub fn empty(variables: Arc<[Variable]>) -> Self {
        let values = vec![None; variables.len()];
        Self { variables, values }
    }

    /// The schema of this solution.
    #[inline]
    pub fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }

    /// Returns the term bound to `index`, or [None] if the variable is unbound or not part of
    /// the schema.
    pub fn get(&self, index: impl SolutionIndex) -> Option<&Term> {
        let i = index.position(&self.variables)?;
        self.values.get(i).and_then(Option::as_ref)
    }

    /// Returns the number of bound variables.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Returns whether no variable is bound.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Iterates over the bound (variable, term) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.variables
            .iter()
            .zip(&self.values)
            .filter_map(|(var, value)| value.as_ref().map(|t| (var, t)))
    }

    /// Projects this solution onto `vars`, returning one optional term per requested variable.
    ///
    /// The result is suitable as a join key: two solutions agree on `vars` iff their projections
    /// are equal.
    pub fn key(&self, vars: &[Variable]) -> Vec<Option<Term>> {
        vars.iter().map(|v| self.get(v).cloned()).collect()
    }

    /// Returns whether `self` and `other` bind every shared variable to the same term.
    pub fn is_compatible(&self, other: &Solution) -> bool {
        self.iter()
            .all(|(var, term)| other.get(var).map_or(true, |t| t == term))
    }

    /// Combines two solutions into one over `schema`.
    ///
    /// For every schema variable the binding of `left` wins; `right` fills the remainder. For
    /// join results the shared variables are equal on both sides, so the choice is only visible
    /// for conflicting inputs, which joins never produce.
    pub fn merge(schema: Arc<[Variable]>, left: &Solution, right: &Solution) -> Solution {
        let values = schema
            .iter()
            .map(|var| left.get(var).or_else(|| right.get(var)).cloned())
            .collect();
        Solution::new(schema, values)
    }

    /// Re-maps this solution onto a (usually narrower) schema, dropping bindings of variables
    /// that are not part of `schema`.
    pub fn map_onto(&self, schema: Arc<[Variable]>) -> Solution {
        let values = schema.iter().map(|var| self.get(var).cloned()).collect();
        Solution::new(schema, values)
    }

    fn sorted_bindings(&self) -> Vec<(&str, &Term)> {
        let mut bindings: Vec<_> = self.iter().map(|(v, t)| (v.as_str(), t)).collect();
        bindings.sort_unstable_by_key(|(name, _)| *name);
        bindings
    }
}

impl From<(Arc<[Variable]>, Vec<Option<Term>>)> for Solution {
    fn from((variables, values): (Arc<[Variable]>, Vec<Option<Term>>)) -> Self {
        Solution::new(variables, values)
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_bindings() == other.sorted_bindings()
    }
}

impl Eq for Solution {}

impl Hash for Solution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (name, term) in self.sorted_bindings() {
            name.hash(state);
            term.hash(state);
        }
    }
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (var, term) in self.iter() {
            map.entry(&var.as_str(), &term.to_string());
        }
        map.finish()
    }
}

/// A way of locating a variable inside a solution schema.
///
/// Implemented for positions, variable names and [Variable] references, mirroring the lookup
/// ergonomics of the SPARQL results crates.
pub trait SolutionIndex {
    /// Returns the position of the addressed variable in `variables`.
    fn position(&self, variables: &[Variable]) -> Option<usize>;
}

impl SolutionIndex for usize {
    fn position(&self, variables: &[Variable]) -> Option<usize> {
        (*self < variables.len()).then_some(*self)
    }
}

impl SolutionIndex for &str {
    fn position(&self, variables: &[Variable]) -> Option<usize> {
        variables.iter().position(|v| v.as_str() == *self)
    }
}

impl SolutionIndex for &Variable {
    fn position(&self, variables: &[Variable]) -> Option<usize> {
        variables.iter().position(|v| v == *self)
    }
}
