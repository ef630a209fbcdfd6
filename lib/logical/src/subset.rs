use std::fmt;

const WORD_BITS: usize = 64;

/// A subset of a fixed index universe, stored as a bitset.
///
/// Used to describe groups of join-graph nodes (candidate paths, components) without copying any
/// node data. All set operations require both operands to share the same universe.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IndexedSubset {
    universe: usize,
    words: Vec<u64>,
}

impl IndexedSubset {
    /// Creates an empty subset over `universe` indices.
    pub fn empty(universe: usize) -> Self {
        Self {
            universe,
            words: vec![0; universe.div_ceil(WORD_BITS)],
        }
    }

    /// Creates the subset containing every index of `universe`.
    pub fn full(universe: usize) -> Self {
        let mut subset = Self::empty(universe);
        for i in 0..universe {
            subset.insert(i);
        }
        subset
    }

    /// Creates a subset from the given indices.
    pub fn from_indices(universe: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut subset = Self::empty(universe);
        for i in indices {
            subset.insert(i);
        }
        subset
    }

    /// The size of the index universe (not the number of members).
    pub fn universe(&self) -> usize {
        self.universe
    }

    /// Adds `index` to the subset.
    pub fn insert(&mut self, index: usize) {
        debug_assert!(index < self.universe);
        self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
    }

    /// Removes `index` from the subset.
    pub fn remove(&mut self, index: usize) {
        debug_assert!(index < self.universe);
        self.words[index / WORD_BITS] &= !(1 << (index % WORD_BITS));
    }

    /// Returns whether `index` is a member.
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.universe {
            return false;
        }
        self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns whether the subset has no members.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// The union of both subsets.
    pub fn union(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a | b)
    }

    /// The intersection of both subsets.
    pub fn intersection(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a & b)
    }

    /// The members of `self` that are not members of `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.zip_words(other, |a, b| a & !b)
    }

    /// Returns whether the subsets share no member.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        debug_assert_eq!(self.universe, other.universe);
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & b == 0)
    }

    /// Returns whether every member of `self` is a member of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        debug_assert_eq!(self.universe, other.universe);
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    /// The smallest member, if any.
    pub fn first(&self) -> Option<usize> {
        self.iter().next()
    }

    /// Iterates over the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.universe).filter(|&i| self.contains(i))
    }

    fn zip_words(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.universe, other.universe);
        Self {
            universe: self.universe,
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        }
    }
}

impl fmt::Debug for IndexedSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_operations() {
        let a = IndexedSubset::from_indices(10, [0, 2, 4]);
        let b = IndexedSubset::from_indices(10, [2, 3]);

        assert_eq!(a.union(&b), IndexedSubset::from_indices(10, [0, 2, 3, 4]));
        assert_eq!(a.intersection(&b), IndexedSubset::from_indices(10, [2]));
        assert_eq!(a.difference(&b), IndexedSubset::from_indices(10, [0, 4]));
        assert!(!a.is_disjoint(&b));
        assert!(a.is_disjoint(&IndexedSubset::from_indices(10, [1, 5])));
    }

    #[test]
    fn membership_and_len() {
        let mut subset = IndexedSubset::empty(70);
        subset.insert(0);
        subset.insert(69);

        assert!(subset.contains(0));
        assert!(subset.contains(69));
        assert!(!subset.contains(35));
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.iter().collect::<Vec<_>>(), vec![0, 69]);

        subset.remove(0);
        assert_eq!(subset.first(), Some(69));
    }

    #[test]
    fn subset_relation() {
        let a = IndexedSubset::from_indices(8, [1, 2]);
        let b = IndexedSubset::from_indices(8, [1, 2, 5]);

        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert!(IndexedSubset::empty(8).is_subset(&a));
    }
}
