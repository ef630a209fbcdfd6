use fedra_common::{BoxSolutionStream, SolutionStream};
use fedra_engine::{FedraInstance, QueryEvaluationError, QueryOutcome};
use fedra_model::{
    Literal, NamedNode, NamedNodePattern, Solution, Term, TermPattern, Triple, TriplePattern,
    Variable,
};
use fedra_storage::MemorySource;
use std::sync::Arc;

fn iri(value: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{value}"))
}

fn var(name: &str) -> Variable {
    Variable::new_unchecked(name)
}

fn pattern(subject: &str, predicate: &str, object: &str) -> TriplePattern {
    fn term(value: &str) -> TermPattern {
        match value.strip_prefix('?') {
            Some(name) => TermPattern::Variable(var(name)),
            None => TermPattern::NamedNode(iri(value)),
        }
    }
    TriplePattern {
        subject: term(subject),
        predicate: NamedNodePattern::NamedNode(iri(predicate)),
        object: term(object),
    }
}

/// A small two-source federation: people live in one source, books in the other.
fn example_federation() -> FedraInstance {
    let people = MemorySource::new("people");
    people.extend(vec![
        Triple::new(iri("alice"), iri("name"), Literal::new_simple_literal("Alice")),
        Triple::new(iri("bob"), iri("name"), Literal::new_simple_literal("Bob")),
        Triple::new(iri("carol"), iri("name"), Literal::new_simple_literal("Carol")),
        Triple::new(iri("alice"), iri("mbox"), Literal::new_simple_literal("alice@example.com")),
    ]);

    let books = MemorySource::new("books");
    books.extend(vec![
        Triple::new(iri("book1"), iri("author"), iri("alice")),
        Triple::new(iri("book2"), iri("author"), iri("bob")),
        Triple::new(iri("book1"), iri("title"), Literal::new_simple_literal("Dune")),
        Triple::new(iri("book2"), iri("title"), Literal::new_simple_literal("Sight")),
    ]);

    let mut federation = FedraInstance::new();
    federation.register_source(Arc::new(people));
    federation.register_source(Arc::new(books));
    federation
}

async fn drain(mut stream: BoxSolutionStream) -> Vec<Solution> {
    let mut collected = Vec::new();
    while stream.has_next().await.unwrap() {
        collected.push(stream.next().await.unwrap());
    }
    stream.close().await.unwrap();
    collected
}

fn literal(value: &str) -> Term {
    Term::Literal(Literal::new_simple_literal(value))
}

#[tokio::test]
async fn joins_patterns_across_sources() {
    let federation = example_federation();
    let patterns = vec![pattern("?p", "name", "?n"), pattern("?b", "author", "?p")];

    let results = drain(federation.execute_patterns(&patterns).await.unwrap()).await;

    assert_eq!(results.len(), 2);
    for solution in &results {
        assert!(solution.get("n").is_some());
        assert!(solution.get("b").is_some());
    }
    assert!(results
        .iter()
        .any(|s| s.get("n") == Some(&literal("Alice"))
            && s.get("b") == Some(&Term::NamedNode(iri("book1")))));
}

#[tokio::test]
async fn select_with_distinct_and_limit() {
    let federation = example_federation();
    let outcome = federation
        .query(
            "SELECT DISTINCT ?n WHERE { \
                ?p <http://example.com/name> ?n . \
                ?b <http://example.com/author> ?p \
             } LIMIT 5",
        )
        .await
        .unwrap();

    let QueryOutcome::Solutions(stream) = outcome else {
        panic!("expected solutions");
    };
    assert!(stream.is_distinct());
    let results = drain(stream).await;
    assert_eq!(results.len(), 2);
    for solution in &results {
        assert!(solution.get("p").is_none(), "projection must narrow the row");
    }
}

#[tokio::test]
async fn optional_keeps_people_without_mailbox() {
    let federation = example_federation();
    let outcome = federation
        .query(
            "SELECT ?n ?m WHERE { \
                ?p <http://example.com/name> ?n \
                OPTIONAL { ?p <http://example.com/mbox> ?m } \
             }",
        )
        .await
        .unwrap();

    let QueryOutcome::Solutions(stream) = outcome else {
        panic!("expected solutions");
    };
    let results = drain(stream).await;

    assert_eq!(results.len(), 3);
    let with_mbox: Vec<_> = results.iter().filter(|s| s.get("m").is_some()).collect();
    assert_eq!(with_mbox.len(), 1);
    assert_eq!(with_mbox[0].get("n"), Some(&literal("Alice")));
}

#[tokio::test]
async fn union_combines_both_branches() {
    let federation = example_federation();
    let outcome = federation
        .query(
            "SELECT ?n WHERE { \
                { ?p <http://example.com/name> ?n } \
                UNION { ?b <http://example.com/title> ?n } \
             }",
        )
        .await
        .unwrap();

    let QueryOutcome::Solutions(stream) = outcome else {
        panic!("expected solutions");
    };
    let results = drain(stream).await;
    assert_eq!(results.len(), 5);
    assert!(results.iter().any(|s| s.get("n") == Some(&literal("Dune"))));
}

#[tokio::test]
async fn ask_reports_existence() {
    let federation = example_federation();

    let outcome = federation
        .query("ASK { ?b <http://example.com/author> <http://example.com/alice> }")
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::Boolean(true)));

    let outcome = federation
        .query("ASK { ?b <http://example.com/author> <http://example.com/carol> }")
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::Boolean(false)));
}

#[tokio::test]
async fn filter_restricts_solutions() {
    let federation = example_federation();
    let outcome = federation
        .query(
            "SELECT ?n WHERE { \
                ?p <http://example.com/name> ?n \
                FILTER (?n = \"Bob\") \
             }",
        )
        .await
        .unwrap();

    let QueryOutcome::Solutions(stream) = outcome else {
        panic!("expected solutions");
    };
    let results = drain(stream).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("n"), Some(&literal("Bob")));
}

#[tokio::test]
async fn overlapping_sources_are_unioned_and_planned_once() {
    // Both sources know colors; only one knows names.
    let left = MemorySource::new("left");
    left.extend(vec![
        Triple::new(iri("alice"), iri("color"), Literal::new_simple_literal("red")),
        Triple::new(iri("alice"), iri("name"), Literal::new_simple_literal("Alice")),
    ]);
    let right = MemorySource::new("right");
    right.extend(vec![Triple::new(
        iri("alice"),
        iri("color"),
        Literal::new_simple_literal("blue"),
    )]);

    let mut federation = FedraInstance::new();
    federation.register_source(Arc::new(left));
    federation.register_source(Arc::new(right));

    let patterns = vec![pattern("?p", "name", "?n"), pattern("?p", "color", "?c")];
    let results = drain(federation.execute_patterns(&patterns).await.unwrap()).await;

    assert_eq!(results.len(), 2);
    let colors: Vec<_> = results.iter().map(|s| s.get("c").cloned()).collect();
    assert!(colors.contains(&Some(literal("red"))));
    assert!(colors.contains(&Some(literal("blue"))));
}

#[tokio::test]
async fn unanswerable_patterns_yield_an_empty_stream() {
    let federation = example_federation();
    let patterns = vec![pattern("?s", "unknown-predicate", "?o")];

    let results = drain(federation.execute_patterns(&patterns).await.unwrap()).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn unsupported_features_are_rejected_with_a_typed_error() {
    let federation = example_federation();
    let result = federation
        .query(
            "SELECT ?s WHERE { \
                ?s <http://example.com/name> ?n \
                MINUS { ?s <http://example.com/mbox> ?m } \
             }",
        )
        .await;

    assert!(matches!(
        result,
        Err(QueryEvaluationError::Unsupported(_))
    ));
}

#[tokio::test]
async fn parse_errors_surface() {
    let federation = example_federation();
    let result = federation.query("SELECT WHERE {").await;
    assert!(matches!(result, Err(QueryEvaluationError::Parsing(_))));
}
