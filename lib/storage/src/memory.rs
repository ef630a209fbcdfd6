use async_trait::async_trait;
use dashmap::DashMap;
use fedra_common::error::SourceError;
use fedra_common::{BoxSolutionStream, Cardinality, Source, SourceQuery};
use fedra_model::{
    NamedNode, NamedNodePattern, Solution, Term, TermPattern, Triple, TriplePattern, Variable,
};
use fedra_physical::VecSolutionStream;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

/// An in-memory federation member.
///
/// Triples are indexed by predicate, which is bound in almost every realistic pattern. Pattern
/// conjunctions are evaluated locally with an iterative bind join, so the engine can push whole
/// exclusive groups down to this source.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    by_predicate: DashMap<NamedNode, Vec<Triple>, BuildHasherDefault<FxHasher>>,
}

impl MemorySource {
    /// Creates an empty source named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_predicate: DashMap::with_hasher(BuildHasherDefault::default()),
        }
    }

    /// Loads the given triples into the source, skipping duplicates. Returns the number of
    /// newly inserted triples.
    pub fn extend(&self, triples: Vec<Triple>) -> usize {
        let mut inserted = 0;
        for triple in triples {
            let mut bucket = self.by_predicate.entry(triple.predicate.clone()).or_default();
            if !bucket.contains(&triple) {
                bucket.push(triple);
                inserted += 1;
            }
        }
        inserted
    }

    /// The number of stored triples.
    pub fn len(&self) -> usize {
        self.by_predicate.iter().map(|bucket| bucket.len()).sum()
    }

    /// Returns whether the source holds no triples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn candidate_triples(&self, pattern: &TriplePattern) -> Vec<Triple> {
        match &pattern.predicate {
            NamedNodePattern::NamedNode(predicate) => self
                .by_predicate
                .get(predicate)
                .map(|bucket| bucket.value().clone())
                .unwrap_or_default(),
            NamedNodePattern::Variable(_) => self
                .by_predicate
                .iter()
                .flat_map(|bucket| bucket.value().clone())
                .collect(),
        }
    }

    fn solutions(&self, query: &SourceQuery) -> Vec<Solution> {
        let variables: Arc<[Variable]> =
            query.variables().into_iter().collect::<Vec<_>>().into();

        // Iterative bind join: every evaluated pattern narrows the partial solutions of the
        // previous ones.
        let mut solutions = vec![Solution::empty(Arc::clone(&variables))];
        for pattern in query.patterns() {
            let candidates = self.candidate_triples(pattern);
            let mut next = Vec::new();
            for solution in &solutions {
                for triple in &candidates {
                    if let Some(partial) = unify(pattern, triple, &variables) {
                        if solution.is_compatible(&partial) {
                            next.push(Solution::merge(
                                Arc::clone(&variables),
                                solution,
                                &partial,
                            ));
                        }
                    }
                }
            }
            solutions = next;
            if solutions.is_empty() {
                break;
            }
        }
        solutions
    }
}

/// Matches one triple against a pattern, returning the variable bindings on success.
///
/// A variable occurring twice in the pattern must bind to the same term; blank nodes act as
/// wildcards without binding anything.
fn unify(
    pattern: &TriplePattern,
    triple: &Triple,
    variables: &Arc<[Variable]>,
) -> Option<Solution> {
    let mut bindings: Vec<(Variable, Term)> = Vec::new();
    let mut bind = |var: &Variable, term: Term| -> bool {
        match bindings.iter().find(|(v, _)| v == var) {
            Some((_, existing)) => *existing == term,
            None => {
                bindings.push((var.clone(), term));
                true
            }
        }
    };

    if !term_pattern_matches(
        &pattern.subject,
        &Term::from(triple.subject.clone()),
        &mut bind,
    ) {
        return None;
    }
    let predicate_matched = match &pattern.predicate {
        NamedNodePattern::Variable(v) => bind(v, Term::NamedNode(triple.predicate.clone())),
        NamedNodePattern::NamedNode(nn) => *nn == triple.predicate,
    };
    if !predicate_matched {
        return None;
    }
    if !term_pattern_matches(&pattern.object, &triple.object, &mut bind) {
        return None;
    }

    let values = variables
        .iter()
        .map(|var| {
            bindings
                .iter()
                .find(|(v, _)| v == var)
                .map(|(_, term)| term.clone())
        })
        .collect();
    Some(Solution::new(Arc::clone(variables), values))
}

fn term_pattern_matches(
    pattern: &TermPattern,
    term: &Term,
    bind: &mut impl FnMut(&Variable, Term) -> bool,
) -> bool {
    match pattern {
        TermPattern::Variable(v) => bind(v, term.clone()),
        TermPattern::BlankNode(_) => true,
        TermPattern::NamedNode(nn) => matches!(term, Term::NamedNode(t) if t == nn),
        TermPattern::Literal(lit) => matches!(term, Term::Literal(t) if t == lit),
    }
}

#[async_trait]
impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, query: SourceQuery) -> Result<BoxSolutionStream, SourceError> {
        let variables: Arc<[Variable]> =
            query.variables().into_iter().collect::<Vec<_>>().into();
        let solutions = self.solutions(&query);
        Ok(Box::new(VecSolutionStream::new(variables, solutions)))
    }

    async fn estimate(&self, query: &SourceQuery) -> Result<Cardinality, SourceError> {
        let count = u64::try_from(self.solutions(query).len()).unwrap_or(u64::MAX);
        Ok(Cardinality::exact(count))
    }
}
