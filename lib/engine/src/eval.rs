use crate::engine::SourceRegistry;
use crate::error::QueryEvaluationError;
use fedra_common::BoxSolutionStream;
use fedra_logical::{NodeId, PlanArena, PlanKind};
use fedra_model::Variable;
use fedra_physical::{
    ChainStream, DistinctStream, FilterStream, HashJoinOptions, HashJoinStream, LimitStream,
    OptionalStream, ProjectionStream,
};
use futures::future::LocalBoxFuture;
use std::sync::Arc;

/// Evaluates the finished plan rooted at `id` bottom-up into a solution stream.
///
/// The arena must not be mutated anymore once evaluation starts.
pub(crate) fn evaluate<'a>(
    arena: &'a PlanArena,
    id: NodeId,
    sources: &'a SourceRegistry,
) -> LocalBoxFuture<'a, Result<BoxSolutionStream, QueryEvaluationError>> {
    Box::pin(async move {
        let stream = evaluate_operator(arena, id, sources).await?;
        Ok(apply_modifiers(arena, id, stream))
    })
}

async fn evaluate_operator(
    arena: &PlanArena,
    id: NodeId,
    sources: &SourceRegistry,
) -> Result<BoxSolutionStream, QueryEvaluationError> {
    match arena.kind(id) {
        PlanKind::Leaf(leaf) => {
            let source = sources
                .get(&leaf.source)
                .ok_or_else(|| QueryEvaluationError::UnknownSource(leaf.source.clone()))?;
            Ok(source.query(leaf.query.clone()).await?)
        }
        PlanKind::Join => {
            let [left, right] = child_pair(arena, id)?;
            Ok(join_streams(arena, left, right, sources, false).await?)
        }
        PlanKind::Cartesian => {
            let [left, right] = child_pair(arena, id)?;
            Ok(join_streams(arena, left, right, sources, true).await?)
        }
        PlanKind::Union => {
            let mut streams = Vec::new();
            let mut variables = std::collections::BTreeSet::new();
            for &child in arena.children(id) {
                variables.extend(arena.result_vars(child));
                streams.push(evaluate(arena, child, sources).await?);
            }
            let variables: Arc<[Variable]> = variables.into_iter().collect::<Vec<_>>().into();
            Ok(Box::new(ChainStream::new(variables, streams)))
        }
        PlanKind::Conjunction => {
            // A conjunction that survived planning is executed as a left-deep join chain.
            let children = arena.children(id).to_vec();
            let mut iter = children.into_iter();
            let Some(first) = iter.next() else {
                return Err(QueryEvaluationError::unsupported("empty conjunction"));
            };
            let mut stream = evaluate(arena, first, sources).await?;
            let mut bound = arena.result_vars(first);
            for child in iter {
                let child_vars = arena.result_vars(child);
                let join_vars: Vec<Variable> =
                    bound.intersection(&child_vars).cloned().collect();
                let right = evaluate(arena, child, sources).await?;
                stream = Box::new(HashJoinStream::new(stream, right, join_vars));
                bound.extend(child_vars);
            }
            Ok(stream)
        }
        PlanKind::Pipe => match *arena.children(id) {
            [child] => evaluate(arena, child, sources).await,
            _ => Err(QueryEvaluationError::unsupported("malformed pipe node")),
        },
    }
}

async fn join_streams(
    arena: &PlanArena,
    left: NodeId,
    right: NodeId,
    sources: &SourceRegistry,
    cartesian: bool,
) -> Result<BoxSolutionStream, QueryEvaluationError> {
    let join_vars: Vec<Variable> = if cartesian {
        Vec::new()
    } else {
        arena
            .result_vars(left)
            .intersection(&arena.result_vars(right))
            .cloned()
            .collect()
    };

    // An optional pattern on one side means the *other* side's rows survive unmatched.
    let options = HashJoinOptions {
        left_optional: arena.modifiers(right).optional,
        right_optional: arena.modifiers(left).optional,
        ..HashJoinOptions::default()
    };

    let left_stream = evaluate(arena, left, sources).await?;
    let right_stream = evaluate(arena, right, sources).await?;
    Ok(Box::new(HashJoinStream::with_options(
        left_stream,
        right_stream,
        join_vars,
        options,
    )))
}

/// Wraps `stream` in the decorators the node's modifiers ask for.
fn apply_modifiers(arena: &PlanArena, id: NodeId, stream: BoxSolutionStream) -> BoxSolutionStream {
    let modifiers = arena.modifiers(id);
    if modifiers.is_empty() {
        return stream;
    }
    let mut stream = stream;

    if !modifiers.filters.is_empty() {
        let filters = modifiers.filters.clone();
        stream = Box::new(FilterStream::new(
            stream,
            Arc::new(move |solution| filters.iter().all(|f| f.evaluate(solution))),
        ));
    }
    if let Some(projection) = &modifiers.projection {
        stream = Box::new(ProjectionStream::new(stream, projection.clone()));
    }
    if modifiers.distinct {
        stream = Box::new(DistinctStream::new(stream));
    }
    let limit = if modifiers.ask {
        Some(modifiers.limit.map_or(1, |l| l.min(1)))
    } else {
        modifiers.limit
    };
    if let Some(limit) = limit {
        stream = Box::new(LimitStream::new(stream, limit));
    }
    if modifiers.optional {
        stream = Box::new(OptionalStream::new(stream));
    }
    stream
}

fn child_pair(arena: &PlanArena, id: NodeId) -> Result<[NodeId; 2], QueryEvaluationError> {
    match *arena.children(id) {
        [left, right] => Ok([left, right]),
        _ => Err(QueryEvaluationError::unsupported("malformed binary node")),
    }
}
