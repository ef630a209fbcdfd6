use fedra_model::{Solution, Term, Variable};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The projection of a solution onto the join variables.
///
/// An empty variable set produces the empty key for every solution, which turns lookups into an
/// unrestricted cross product.
pub type JoinKey = Vec<Option<Term>>;

struct Entry {
    solution: Solution,
    fetched: bool,
}

/// A multimap from join keys to the solutions one join side has produced so far.
///
/// With fetch tracking enabled the table records which stored entries were ever matched by a
/// probe; the unmatched remainder is what an outer join emits as standalone solutions. Tables
/// live only for the duration of one join execution.
pub struct JoinHashTable {
    join_vars: Arc<[Variable]>,
    buckets: FxHashMap<JoinKey, Vec<Entry>>,
    track_fetched: bool,
    len: usize,
}

impl JoinHashTable {
    /// Creates an empty table keyed by `join_vars`.
    pub fn new(join_vars: Arc<[Variable]>, track_fetched: bool) -> Self {
        Self {
            join_vars,
            buckets: FxHashMap::default(),
            track_fetched,
            len: 0,
        }
    }

    /// The key of `solution` under this table's join variables.
    pub fn key_of(&self, solution: &Solution) -> JoinKey {
        solution.key(&self.join_vars)
    }

    /// Stores `solution`.
    ///
    /// `already_fetched` records that the solution matched during its own probe of the other
    /// side, so it is not emitted again as an outer-join leftover.
    pub fn insert(&mut self, solution: Solution, already_fetched: bool) {
        let key = self.key_of(&solution);
        self.buckets.entry(key).or_default().push(Entry {
            solution,
            fetched: already_fetched,
        });
        self.len += 1;
    }

    /// Returns every stored solution matching `key`, marking the returned entries as fetched
    /// when tracking is enabled.
    pub fn matches(&mut self, key: &JoinKey) -> Vec<Solution> {
        let track = self.track_fetched;
        let Some(bucket) = self.buckets.get_mut(key) else {
            return Vec::new();
        };
        bucket
            .iter_mut()
            .map(|entry| {
                if track {
                    entry.fetched = true;
                }
                entry.solution.clone()
            })
            .collect()
    }

    /// Returns every stored solution never matched by a probe.
    pub fn unfetched(&self) -> Vec<Solution> {
        self.buckets
            .values()
            .flatten()
            .filter(|entry| !entry.fetched)
            .map(|entry| entry.solution.clone())
            .collect()
    }

    /// Drops all stored solutions.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// The number of stored solutions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedra_model::NamedNode;

    fn schema() -> Arc<[Variable]> {
        vec![Variable::new_unchecked("x"), Variable::new_unchecked("y")].into()
    }

    fn term(value: &str) -> Term {
        Term::NamedNode(NamedNode::new_unchecked(format!("http://example.com/{value}")))
    }

    fn solution(x: &str, y: &str) -> Solution {
        Solution::new(schema(), vec![Some(term(x)), Some(term(y))])
    }

    fn join_vars() -> Arc<[Variable]> {
        vec![Variable::new_unchecked("x")].into()
    }

    #[test]
    fn bulk_lookup_by_key() {
        let mut table = JoinHashTable::new(join_vars(), false);
        table.insert(solution("a", "1"), false);
        table.insert(solution("a", "2"), false);
        table.insert(solution("b", "3"), false);

        let key = table.key_of(&solution("a", "9"));
        assert_eq!(table.matches(&key).len(), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn empty_join_variables_match_everything() {
        let mut table = JoinHashTable::new(Vec::new().into(), false);
        table.insert(solution("a", "1"), false);
        table.insert(solution("b", "2"), false);

        let key = table.key_of(&solution("c", "3"));
        assert_eq!(table.matches(&key).len(), 2);
    }

    #[test]
    fn fetch_tracking_records_probed_entries() {
        let mut table = JoinHashTable::new(join_vars(), true);
        table.insert(solution("a", "1"), false);
        table.insert(solution("b", "2"), false);

        let key = table.key_of(&solution("a", "9"));
        let _ = table.matches(&key);

        let unfetched = table.unfetched();
        assert_eq!(unfetched, vec![solution("b", "2")]);

        table.clear();
        assert!(table.is_empty());
        assert!(table.unfetched().is_empty());
    }

    #[test]
    fn without_tracking_nothing_counts_as_fetched() {
        let mut table = JoinHashTable::new(join_vars(), false);
        table.insert(solution("a", "1"), false);

        let key = table.key_of(&solution("a", "9"));
        let _ = table.matches(&key);
        assert_eq!(table.unfetched().len(), 1);
    }
}
