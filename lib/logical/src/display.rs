use crate::arena::{NodeId, PlanArena};
use crate::node::{FilterExpr, PlanKind};
use itertools::Itertools;
use std::fmt;

impl PlanArena {
    /// Returns an explain-style rendering of the tree rooted at `root`.
    pub fn display(&self, root: NodeId) -> PlanDisplay<'_> {
        PlanDisplay { arena: self, root }
    }
}

/// Renders a plan tree with one node per line, children indented below their parent.
pub struct PlanDisplay<'a> {
    arena: &'a PlanArena,
    root: NodeId,
}

impl fmt::Display for PlanDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(f, self.arena, self.root, 0)
    }
}

fn fmt_node(
    f: &mut fmt::Formatter<'_>,
    arena: &PlanArena,
    id: NodeId,
    indent: usize,
) -> fmt::Result {
    write!(f, "{:indent$}", "", indent = indent * 2)?;
    match arena.kind(id) {
        PlanKind::Leaf(leaf) => {
            let patterns = leaf
                .query
                .patterns()
                .iter()
                .map(|p| format!("({} {} {})", p.subject, p.predicate, p.object))
                .join(" ");
            write!(f, "{}: {patterns}", arena.name(id))?;
        }
        _ => write!(f, "{}", arena.name(id))?,
    }

    let modifiers = arena.modifiers(id);
    let mut notes = Vec::new();
    if let Some(projection) = &modifiers.projection {
        notes.push(format!(
            "project {}",
            projection.iter().map(ToString::to_string).join(" ")
        ));
    }
    for filter in &modifiers.filters {
        notes.push(match filter {
            FilterExpr::Bound(v) => format!("filter bound({v})"),
            FilterExpr::SameTerm(a, b) => format!("filter sameTerm({a}, {b})"),
            FilterExpr::Equals(v, term) => format!("filter {v} = {term}"),
        });
    }
    if modifiers.distinct {
        notes.push("distinct".into());
    }
    if let Some(limit) = modifiers.limit {
        notes.push(format!("limit {limit}"));
    }
    if modifiers.optional {
        notes.push("optional".into());
    }
    if modifiers.ask {
        notes.push("ask".into());
    }
    if !notes.is_empty() {
        write!(f, " [{}]", notes.join(", "))?;
    }
    writeln!(f)?;

    for &child in arena.children(id) {
        fmt_node(f, arena, child, indent + 1)?;
    }
    Ok(())
}
