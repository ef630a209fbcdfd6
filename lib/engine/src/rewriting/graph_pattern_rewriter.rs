use crate::engine::SourceRegistry;
use crate::error::QueryEvaluationError;
use crate::planner::FedraPlanner;
use fedra_logical::{FilterExpr, NodeId, PlanArena};
use fedra_model::{Term, Variable};
use futures::future::BoxFuture;
use spargebra::algebra::{Expression, GraphPattern};

/// Rewrites the supported fragment of the SPARQL algebra into Fedra's plan algebra.
///
/// Basic graph patterns go through the federated planner; the surrounding algebra (joins,
/// OPTIONAL, UNION, simple filters, projection, DISTINCT, LIMIT) maps onto plan nodes and
/// modifiers. Everything else is rejected with a typed error instead of being answered wrongly.
pub(crate) struct GraphPatternRewriter<'a> {
    planner: &'a FedraPlanner,
    sources: &'a SourceRegistry,
}

impl<'a> GraphPatternRewriter<'a> {
    pub(crate) fn new(planner: &'a FedraPlanner, sources: &'a SourceRegistry) -> Self {
        Self { planner, sources }
    }

    /// Rewrites `pattern` into a plan rooted in `arena`.
    ///
    /// Returns [None] when the pattern is statically known to produce no solutions.
    pub(crate) fn rewrite<'b>(
        &'b self,
        arena: &'b mut PlanArena,
        pattern: &'b GraphPattern,
    ) -> BoxFuture<'b, Result<Option<NodeId>, QueryEvaluationError>> {
        Box::pin(async move {
            match pattern {
                GraphPattern::Bgp { patterns } => {
                    if patterns.is_empty() {
                        return Err(QueryEvaluationError::unsupported(
                            "empty basic graph pattern",
                        ));
                    }
                    self.planner
                        .plan_patterns(arena, patterns, self.sources)
                        .await
                }
                GraphPattern::Join { left, right } => {
                    let Some(left) = self.rewrite(&mut *arena, left).await? else {
                        return Ok(None);
                    };
                    let Some(right) = self.rewrite(&mut *arena, right).await? else {
                        return Ok(None);
                    };
                    Ok(Some(self.join(arena, left, right)?))
                }
                GraphPattern::LeftJoin {
                    left,
                    right,
                    expression,
                } => {
                    if expression.is_some() {
                        return Err(QueryEvaluationError::unsupported(
                            "FILTER inside OPTIONAL",
                        ));
                    }
                    let Some(left) = self.rewrite(&mut *arena, left).await? else {
                        return Ok(None);
                    };
                    let Some(right) = self.rewrite(&mut *arena, right).await? else {
                        return Ok(Some(left));
                    };
                    arena.set_optional(right, true);
                    Ok(Some(self.join(arena, left, right)?))
                }
                GraphPattern::Union { left, right } => {
                    let left = self.rewrite(&mut *arena, left).await?;
                    let right = self.rewrite(&mut *arena, right).await?;
                    match (left, right) {
                        (Some(left), Some(right)) => Ok(Some(arena.union(vec![left, right])?)),
                        (Some(single), None) | (None, Some(single)) => Ok(Some(single)),
                        (None, None) => Ok(None),
                    }
                }
                GraphPattern::Filter { expr, inner } => {
                    let Some(inner) = self.rewrite(&mut *arena, inner).await? else {
                        return Ok(None);
                    };
                    for filter in convert_expression(expr)? {
                        arena.add_filter(inner, filter);
                    }
                    Ok(Some(inner))
                }
                GraphPattern::Project { inner, variables } => {
                    let Some(inner) = self.rewrite(&mut *arena, inner).await? else {
                        return Ok(None);
                    };
                    let pipe = arena.pipe(inner)?;
                    // Variables the plan cannot bind stay unbound either way, so the
                    // projection is restricted to the answerable ones.
                    let result = arena.result_vars(inner);
                    let projection: Vec<Variable> = variables
                        .iter()
                        .filter(|v| result.contains(*v))
                        .cloned()
                        .collect();
                    arena.set_projection(pipe, Some(projection));
                    Ok(Some(pipe))
                }
                GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => {
                    let Some(inner) = self.rewrite(&mut *arena, inner).await? else {
                        return Ok(None);
                    };
                    arena.set_distinct(inner, true);
                    Ok(Some(inner))
                }
                GraphPattern::Slice {
                    inner,
                    start,
                    length,
                } => {
                    if *start > 0 {
                        return Err(QueryEvaluationError::unsupported("OFFSET"));
                    }
                    let Some(inner) = self.rewrite(&mut *arena, inner).await? else {
                        return Ok(None);
                    };
                    if let Some(length) = length {
                        arena.set_limit(inner, Some(u64::try_from(*length).unwrap_or(u64::MAX)));
                    }
                    Ok(Some(inner))
                }
                other => Err(QueryEvaluationError::unsupported(pattern_name(other))),
            }
        })
    }

    fn join(
        &self,
        arena: &mut PlanArena,
        left: NodeId,
        right: NodeId,
    ) -> Result<NodeId, QueryEvaluationError> {
        let shared = arena
            .result_vars(left)
            .intersection(&arena.result_vars(right))
            .next()
            .is_some();
        let node = if shared {
            arena.join(left, right)?
        } else {
            arena.cartesian(left, right)?
        };
        Ok(node)
    }
}

/// Converts a SPARQL expression into the conjunctive filter fragment the engine evaluates
/// itself.
fn convert_expression(expr: &Expression) -> Result<Vec<FilterExpr>, QueryEvaluationError> {
    match expr {
        Expression::And(left, right) => {
            let mut filters = convert_expression(left)?;
            filters.extend(convert_expression(right)?);
            Ok(filters)
        }
        Expression::Bound(variable) => Ok(vec![FilterExpr::Bound(variable.clone())]),
        Expression::SameTerm(left, right) | Expression::Equal(left, right) => {
            match (operand(left), operand(right)) {
                (Some(Operand::Variable(a)), Some(Operand::Variable(b))) => {
                    Ok(vec![FilterExpr::SameTerm(a, b)])
                }
                (Some(Operand::Variable(v)), Some(Operand::Term(t)))
                | (Some(Operand::Term(t)), Some(Operand::Variable(v))) => {
                    Ok(vec![FilterExpr::Equals(v, t)])
                }
                _ => Err(QueryEvaluationError::unsupported(
                    "comparison of computed expressions",
                )),
            }
        }
        _ => Err(QueryEvaluationError::unsupported(
            "non-trivial filter expression",
        )),
    }
}

enum Operand {
    Variable(Variable),
    Term(Term),
}

fn operand(expr: &Expression) -> Option<Operand> {
    match expr {
        Expression::Variable(v) => Some(Operand::Variable(v.clone())),
        Expression::NamedNode(nn) => Some(Operand::Term(Term::NamedNode(nn.clone()))),
        Expression::Literal(lit) => Some(Operand::Term(Term::Literal(lit.clone()))),
        _ => None,
    }
}

fn pattern_name(pattern: &GraphPattern) -> &'static str {
    match pattern {
        GraphPattern::Path { .. } => "property paths",
        GraphPattern::Graph { .. } => "GRAPH",
        GraphPattern::Extend { .. } => "BIND",
        GraphPattern::Minus { .. } => "MINUS",
        GraphPattern::Values { .. } => "VALUES",
        GraphPattern::OrderBy { .. } => "ORDER BY",
        GraphPattern::Group { .. } => "aggregation",
        GraphPattern::Service { .. } => "SERVICE",
        _ => "this graph pattern",
    }
}
