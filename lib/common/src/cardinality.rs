use std::fmt;

/// How much an estimated row count can be trusted.
///
/// Tiers only order estimates against each other for cost comparisons. They carry no numeric
/// error bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReliabilityTier {
    /// A guess derived from the shape of the query alone.
    Guess,
    /// An estimate derived from statistics of the data.
    Estimated,
    /// An exact count.
    Exact,
}

/// An estimated row count together with its [ReliabilityTier].
///
/// Cardinalities are used for cost comparisons during join planning and are never required to be
/// exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cardinality {
    /// The estimated number of rows.
    pub value: u64,
    /// How much `value` can be trusted.
    pub tier: ReliabilityTier,
}

impl Cardinality {
    /// Creates an exact [Cardinality].
    pub fn exact(value: u64) -> Self {
        Self {
            value,
            tier: ReliabilityTier::Exact,
        }
    }

    /// Creates an estimated [Cardinality].
    pub fn estimated(value: u64) -> Self {
        Self {
            value,
            tier: ReliabilityTier::Estimated,
        }
    }

    /// Creates a guessed [Cardinality].
    pub fn guess(value: u64) -> Self {
        Self {
            value,
            tier: ReliabilityTier::Guess,
        }
    }

    /// Returns whether the source is known to hold no matching rows.
    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.tier == ReliabilityTier::Exact
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier {
            ReliabilityTier::Exact => write!(f, "{}", self.value),
            ReliabilityTier::Estimated => write!(f, "~{}", self.value),
            ReliabilityTier::Guess => write!(f, "?{}", self.value),
        }
    }
}
