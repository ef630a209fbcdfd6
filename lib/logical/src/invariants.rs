use crate::arena::{NodeId, PlanArena};
use crate::error::PlanError;
use crate::node::PlanKind;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

impl PlanArena {
    /// Recomputes every derived variable set below `root` and checks all plan invariants.
    ///
    /// This walks the whole tree and recomputes without the cache, so it is intended for tests
    /// and debug builds; use [PlanArena::debug_verify] in production code paths.
    pub fn verify_invariants(&self, root: NodeId) -> Result<(), PlanError> {
        if !self.contains(root) {
            return Err(PlanError::UnknownNode(root));
        }
        let mut visited = FxHashSet::default();
        self.verify_node(root, &mut visited)
    }

    /// Runs [PlanArena::verify_invariants] in debug builds only.
    #[allow(clippy::panic, reason = "Invariant violations are programmer errors")]
    pub fn debug_verify(&self, root: NodeId) {
        #[cfg(debug_assertions)]
        if let Err(error) = self.verify_invariants(root) {
            panic!("{error}");
        }
        #[cfg(not(debug_assertions))]
        let _ = root;
    }

    fn verify_node(&self, id: NodeId, visited: &mut FxHashSet<NodeId>) -> Result<(), PlanError> {
        if !visited.insert(id) {
            // Shared sub-plans are checked once.
            return Ok(());
        }

        let node = self.node(id);

        // Parent lists carry no duplicate identity entries.
        let parents = self.parents(id);
        let unique: FxHashSet<NodeId> = parents.iter().copied().collect();
        if unique.len() != parents.len() {
            return Err(self.violation(id, "duplicate parent back-reference"));
        }
        if parents.contains(&id) {
            return Err(PlanError::SelfParent(id));
        }

        // Arity per operator.
        let arity_ok = match node.kind {
            PlanKind::Join | PlanKind::Cartesian => node.children.len() == 2,
            PlanKind::Pipe => node.children.len() == 1,
            PlanKind::Leaf(_) => node.children.is_empty(),
            PlanKind::Union | PlanKind::Conjunction => true,
        };
        if !arity_ok {
            return Err(self.violation(
                id,
                format!("{} node with {} children", node.kind.label(), node.children.len()),
            ));
        }

        let fresh = self.compute_var_sets_fresh(id);
        let input = fresh.input();
        let strict = fresh.strict_result();
        let public = fresh.public();

        if let Some(projection) = &node.modifiers.projection {
            let projected: BTreeSet<_> = projection.iter().cloned().collect();
            if projected != fresh.result {
                return Err(self.violation(id, "projection does not name exactly the result vars"));
            }
        }
        if !fresh.result.is_subset(&public) || !input.is_subset(&public) {
            return Err(self.violation(id, "public vars do not cover result and input"));
        }
        if !fresh.required_input.is_subset(&input) || !fresh.optional_input.is_subset(&input) {
            return Err(self.violation(id, "input vars do not cover required and optional"));
        }
        if !strict.is_subset(&fresh.result) {
            return Err(self.violation(id, "strict result vars are not result vars"));
        }
        if strict.intersection(&input).next().is_some() {
            return Err(self.violation(id, "strict result vars overlap input vars"));
        }

        // A stale cache entry would silently answer queries wrongly.
        if let Some(cached) = self.cached_var_sets(id) {
            if cached != fresh {
                return Err(self.violation(id, "cached variable sets are stale"));
            }
        }

        for &child in &self.node(id).children {
            self.verify_node(child, visited)?;
        }
        Ok(())
    }

    fn violation(&self, node: NodeId, message: impl Into<String>) -> PlanError {
        PlanError::InvariantViolation {
            node,
            message: message.into(),
        }
    }
}
