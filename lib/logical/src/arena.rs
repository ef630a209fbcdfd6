use crate::error::PlanError;
use crate::node::{FilterExpr, LeafQuery, Modifiers, PlanKind, VarSets};
use fedra_common::{Cardinality, SourceQuery};
use fedra_model::{TriplePattern, Variable};
use rustc_hash::{FxHashSet, FxHasher};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A stable handle to a node inside a [PlanArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The non-owning parent back-references of a node.
///
/// Parents are only used for cache invalidation and existence checks. The common single-parent
/// case avoids a heap allocation; several parents are legal when distinct plans share a sub-plan.
#[derive(Debug, Clone, Default)]
enum Parents {
    #[default]
    None,
    One(NodeId),
    Many(Vec<NodeId>),
}

impl Parents {
    fn as_slice(&self) -> &[NodeId] {
        match self {
            Parents::None => &[],
            Parents::One(id) => std::slice::from_ref(id),
            Parents::Many(ids) => ids,
        }
    }

    fn contains(&self, id: NodeId) -> bool {
        self.as_slice().contains(&id)
    }

    fn add(&mut self, id: NodeId) {
        match self {
            Parents::None => *self = Parents::One(id),
            Parents::One(existing) => *self = Parents::Many(vec![*existing, id]),
            Parents::Many(ids) => ids.push(id),
        }
    }

    fn remove(&mut self, id: NodeId) -> bool {
        match self {
            Parents::None => false,
            Parents::One(existing) => {
                if *existing == id {
                    *self = Parents::None;
                    true
                } else {
                    false
                }
            }
            Parents::Many(ids) => {
                let Some(position) = ids.iter().position(|p| *p == id) else {
                    return false;
                };
                ids.remove(position);
                if let [only] = ids.as_slice() {
                    *self = Parents::One(*only);
                }
                true
            }
        }
    }
}

pub(crate) struct PlanNode {
    pub(crate) name: String,
    pub(crate) kind: PlanKind,
    pub(crate) children: Vec<NodeId>,
    parents: Parents,
    pub(crate) modifiers: Modifiers,
    pub(crate) cardinality: Option<Cardinality>,
    /// The cached derived variable sets, dropped as one unit on purge.
    cache: RefCell<Option<VarSets>>,
    /// Whether the cache was read since the last purge. Purges only traverse the
    /// neighborhood when this is set.
    cache_read: Cell<bool>,
}

impl PlanNode {
    fn new(name: String, kind: PlanKind, children: Vec<NodeId>) -> Self {
        Self {
            name,
            kind,
            children,
            parents: Parents::None,
            modifiers: Modifiers::default(),
            cardinality: None,
            cache: RefCell::new(None),
            cache_read: Cell::new(false),
        }
    }
}

/// The arena owning all nodes of one planning session.
///
/// Nodes form a DAG: children are owning tree edges, parents are non-owning back-references
/// (several parents are legal when plans share a sub-plan). Nodes are mutated in place during
/// planning and must be treated as immutable once execution starts.
///
/// All variable-set queries are memoized per node. Every structural or modifier mutation purges
/// the mutated node and, gated on the dirty-read flag, its ancestors.
#[derive(Default)]
pub struct PlanArena {
    nodes: Vec<PlanNode>,
}

impl PlanArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of nodes ever created in this arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns whether `id` belongs to this arena.
    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    //
    // Constructors
    //

    /// Creates a leaf node querying `source`.
    pub fn leaf(&mut self, source: impl Into<String>, query: SourceQuery) -> NodeId {
        let source = source.into();
        let name = format!("Leaf@{source}");
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(PlanNode::new(name, PlanKind::Leaf(LeafQuery { source, query }), Vec::new()));
        id
    }

    /// Creates a binary join of `left` and `right`.
    pub fn join(&mut self, left: NodeId, right: NodeId) -> Result<NodeId, PlanError> {
        self.add_node("Join".into(), PlanKind::Join, vec![left, right])
    }

    /// Creates a cross product of `left` and `right`.
    pub fn cartesian(&mut self, left: NodeId, right: NodeId) -> Result<NodeId, PlanError> {
        self.add_node("Cartesian".into(), PlanKind::Cartesian, vec![left, right])
    }

    /// Creates a union over `children`.
    pub fn union(&mut self, children: Vec<NodeId>) -> Result<NodeId, PlanError> {
        self.add_node("Union".into(), PlanKind::Union, children)
    }

    /// Creates a conjunction group over `children`.
    pub fn conjunction(&mut self, children: Vec<NodeId>) -> Result<NodeId, PlanError> {
        self.add_node("Conjunction".into(), PlanKind::Conjunction, children)
    }

    /// Creates a pipe wrapping `child`.
    pub fn pipe(&mut self, child: NodeId) -> Result<NodeId, PlanError> {
        self.add_node("Pipe".into(), PlanKind::Pipe, vec![child])
    }

    fn add_node(
        &mut self,
        name: String,
        kind: PlanKind,
        children: Vec<NodeId>,
    ) -> Result<NodeId, PlanError> {
        for &child in &children {
            if !self.contains(child) {
                return Err(PlanError::UnknownNode(child));
            }
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(PlanNode::new(name, kind, children.clone()));
        for &child in &children {
            self.attach(child, id)?;
        }
        Ok(id)
    }

    //
    // Accessors
    //

    /// The operator of `id`.
    pub fn kind(&self, id: NodeId) -> &PlanKind {
        &self.nodes[id.0].kind
    }

    /// The children of `id`, in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The registered parents of `id`.
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        self.nodes[id.0].parents.as_slice()
    }

    /// The diagnostic name of `id`.
    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Overrides the diagnostic name of `id`.
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.nodes[id.0].name = name.into();
    }

    /// The modifier set of `id`.
    pub fn modifiers(&self, id: NodeId) -> &Modifiers {
        &self.nodes[id.0].modifiers
    }

    /// The cardinality estimate of `id`, if one was recorded.
    pub fn cardinality(&self, id: NodeId) -> Option<Cardinality> {
        self.nodes[id.0].cardinality
    }

    /// Records a cardinality estimate for `id`.
    pub fn set_cardinality(&mut self, id: NodeId, cardinality: Cardinality) {
        self.nodes[id.0].cardinality = Some(cardinality);
    }

    /// The triple patterns matched below `id`.
    pub fn matched_patterns(&self, id: NodeId) -> FxHashSet<TriplePattern> {
        let mut patterns = FxHashSet::default();
        self.collect_matched_patterns(id, &mut patterns);
        patterns
    }

    fn collect_matched_patterns(&self, id: NodeId, patterns: &mut FxHashSet<TriplePattern>) {
        match &self.nodes[id.0].kind {
            PlanKind::Leaf(leaf) => patterns.extend(leaf.query.patterns().iter().cloned()),
            _ => {
                for &child in &self.nodes[id.0].children {
                    self.collect_matched_patterns(child, patterns);
                }
            }
        }
    }

    //
    // Parent back-references
    //

    /// Registers `parent` as a back-reference on `node`.
    ///
    /// Self-parenting is always rejected; this check is cheap and guards against infinite purge
    /// traversals. Registering the same parent twice is rejected because parent lists carry no
    /// duplicate identity entries.
    pub fn attach(&mut self, node: NodeId, parent: NodeId) -> Result<(), PlanError> {
        if node == parent {
            return Err(PlanError::SelfParent(node));
        }
        if !self.contains(node) {
            return Err(PlanError::UnknownNode(node));
        }
        if !self.contains(parent) {
            return Err(PlanError::UnknownNode(parent));
        }
        if self.nodes[node.0].parents.contains(parent) {
            return Err(PlanError::DuplicateParent { node, parent });
        }
        self.nodes[node.0].parents.add(parent);
        Ok(())
    }

    /// Removes exactly one back-reference to `parent` from `node`.
    pub fn detach(&mut self, node: NodeId, parent: NodeId) -> Result<(), PlanError> {
        if !self.contains(node) {
            return Err(PlanError::UnknownNode(node));
        }
        if !self.nodes[node.0].parents.remove(parent) {
            return Err(PlanError::ParentNotRegistered { node, parent });
        }
        Ok(())
    }

    //
    // Structure mutation
    //

    /// Appends `child` to the children of `parent` and registers the back-reference.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlanError> {
        if !self.contains(parent) {
            return Err(PlanError::UnknownNode(parent));
        }
        self.attach(child, parent)?;
        self.nodes[parent.0].children.push(child);
        self.purge_up(parent);
        Ok(())
    }

    /// Removes the first occurrence of `child` from the children of `parent` and drops the
    /// back-reference.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PlanError> {
        if !self.contains(parent) {
            return Err(PlanError::UnknownNode(parent));
        }
        let Some(position) = self.nodes[parent.0].children.iter().position(|c| *c == child)
        else {
            return Err(PlanError::ChildNotFound { parent, child });
        };
        self.nodes[parent.0].children.remove(position);
        self.detach(child, parent)?;
        self.purge_up(parent);
        Ok(())
    }

    //
    // Modifiers
    //

    /// Sets or clears the projection of `id`.
    pub fn set_projection(&mut self, id: NodeId, projection: Option<Vec<Variable>>) {
        self.nodes[id.0].modifiers.projection = projection;
        self.purge_up(id);
    }

    /// Adds a filter to `id`.
    pub fn add_filter(&mut self, id: NodeId, filter: FilterExpr) {
        self.nodes[id.0].modifiers.filters.push(filter);
        self.purge_up(id);
    }

    /// Marks `id` as duplicate-free.
    pub fn set_distinct(&mut self, id: NodeId, distinct: bool) {
        self.nodes[id.0].modifiers.distinct = distinct;
        self.purge_up(id);
    }

    /// Limits the number of solutions `id` emits.
    pub fn set_limit(&mut self, id: NodeId, limit: Option<u64>) {
        self.nodes[id.0].modifiers.limit = limit;
        self.purge_up(id);
    }

    /// Marks `id` as an optional pattern.
    pub fn set_optional(&mut self, id: NodeId, optional: bool) {
        self.nodes[id.0].modifiers.optional = optional;
        self.purge_up(id);
    }

    /// Marks `id` as an existence check.
    pub fn set_ask(&mut self, id: NodeId, ask: bool) {
        self.nodes[id.0].modifiers.ask = ask;
        self.purge_up(id);
    }

    //
    // Derived variable sets
    //

    /// The derived variable sets of `id`, memoized until the next purge.
    pub fn var_sets(&self, id: NodeId) -> VarSets {
        let node = &self.nodes[id.0];
        node.cache_read.set(true);
        if let Some(sets) = node.cache.borrow().as_ref() {
            return sets.clone();
        }
        let sets = self.compute_var_sets(id);
        *node.cache.borrow_mut() = Some(sets.clone());
        sets
    }

    /// The variables `id` can bind, after projection if any.
    pub fn result_vars(&self, id: NodeId) -> BTreeSet<Variable> {
        self.var_sets(id).result
    }

    /// The variables `id` needs bound from outside.
    pub fn required_input_vars(&self, id: NodeId) -> BTreeSet<Variable> {
        self.var_sets(id).required_input
    }

    /// The variables `id` can use when bound from outside.
    pub fn optional_input_vars(&self, id: NodeId) -> BTreeSet<Variable> {
        self.var_sets(id).optional_input
    }

    /// required-input ∪ optional-input of `id`.
    pub fn input_vars(&self, id: NodeId) -> BTreeSet<Variable> {
        self.var_sets(id).input()
    }

    /// The variables `id` is solely responsible for.
    pub fn strict_result_vars(&self, id: NodeId) -> BTreeSet<Variable> {
        self.var_sets(id).strict_result()
    }

    /// Every variable visible at `id`.
    pub fn public_vars(&self, id: NodeId) -> BTreeSet<Variable> {
        self.var_sets(id).public()
    }

    /// Computes the variable sets of `id` from its kind, children and modifiers.
    ///
    /// Child lookups go through the cache; [PlanArena::compute_var_sets_fresh] recomputes the
    /// whole subtree and is what the invariant checker uses.
    pub(crate) fn compute_var_sets(&self, id: NodeId) -> VarSets {
        self.compute_var_sets_with(id, &|child| self.var_sets(child))
    }

    pub(crate) fn compute_var_sets_fresh(&self, id: NodeId) -> VarSets {
        self.compute_var_sets_with(id, &|child| self.compute_var_sets_fresh(child))
    }

    fn compute_var_sets_with(
        &self,
        id: NodeId,
        child_sets: &dyn Fn(NodeId) -> VarSets,
    ) -> VarSets {
        let node = &self.nodes[id.0];
        let mut result = BTreeSet::new();
        let mut required = BTreeSet::new();
        let mut optional = BTreeSet::new();

        match &node.kind {
            PlanKind::Leaf(leaf) => {
                result = leaf.query.variables();
            }
            _ => {
                for &child in &node.children {
                    let sets = child_sets(child);
                    result.extend(sets.result.iter().cloned());
                    if self.nodes[child.0].modifiers.optional {
                        // An optional child contributes no hard requirement: everything it
                        // needs or binds becomes optionally usable at this node.
                        optional.extend(sets.input());
                        optional.extend(sets.result);
                    } else {
                        required.extend(sets.required_input);
                        optional.extend(sets.optional_input);
                    }
                }
            }
        }

        // Filter variables the node does not bind itself must come from outside.
        let mut filter_vars = BTreeSet::new();
        for filter in &node.modifiers.filters {
            filter.collect_variables(&mut filter_vars);
        }
        for var in filter_vars {
            if !result.contains(&var) {
                required.insert(var);
            }
        }

        // Union branches are alternatives, not providers, so sibling results do not satisfy a
        // branch's requirements.
        if !matches!(node.kind, PlanKind::Union) {
            required.retain(|v| !result.contains(v));
        }
        optional.retain(|v| !required.contains(v));

        if let Some(projection) = &node.modifiers.projection {
            result.retain(|v| projection.contains(v));
        }

        VarSets {
            required_input: required,
            optional_input: optional,
            result,
        }
    }

    //
    // Cache invalidation
    //

    /// Drops the cached variable sets of `id` alone and resets the dirty-read flag.
    pub fn shallow_purge(&self, id: NodeId) {
        let node = &self.nodes[id.0];
        node.cache.replace(None);
        node.cache_read.set(false);
    }

    /// Purges `id` and, if its cache was read since the last purge, all ancestors.
    ///
    /// Upward propagation is mandatory after a mutation because a node's derived sets are a
    /// function of its children's. Trees nobody queried since the last purge are skipped.
    pub fn purge_up(&self, id: NodeId) {
        let dirty = self.nodes[id.0].cache_read.get();
        self.shallow_purge(id);
        if dirty {
            let parents = self.nodes[id.0].parents.as_slice().to_vec();
            for parent in parents {
                self.purge_up(parent);
            }
        }
    }

    /// Purges `id` and, if its cache was read since the last purge, its whole subtree.
    pub fn purge_down(&self, id: NodeId) {
        let dirty = self.nodes[id.0].cache_read.get();
        self.shallow_purge(id);
        if dirty {
            let children = self.nodes[id.0].children.clone();
            for child in children {
                self.purge_down(child);
            }
        }
    }

    pub(crate) fn cache_state(&self, id: NodeId) -> (bool, bool) {
        let node = &self.nodes[id.0];
        (node.cache.borrow().is_some(), node.cache_read.get())
    }

    pub(crate) fn cached_var_sets(&self, id: NodeId) -> Option<VarSets> {
        self.nodes[id.0].cache.borrow().clone()
    }

    pub(crate) fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    //
    // Structural equality
    //

    /// Returns whether `a` and `b` describe the same operator tree.
    ///
    /// Equality is defined by (kind, modifier set, ordered children), not by identity, so
    /// separately built trees compare equal and plans can be deduplicated.
    pub fn structural_eq(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let (node_a, node_b) = (&self.nodes[a.0], &self.nodes[b.0]);
        node_a.kind == node_b.kind
            && node_a.modifiers == node_b.modifiers
            && node_a.children.len() == node_b.children.len()
            && node_a
                .children
                .iter()
                .zip(&node_b.children)
                .all(|(&ca, &cb)| self.structural_eq(ca, cb))
    }

    /// A hash consistent with [PlanArena::structural_eq].
    pub fn structural_hash(&self, id: NodeId) -> u64 {
        let mut hasher = FxHasher::default();
        self.structural_hash_into(id, &mut hasher);
        hasher.finish()
    }

    fn structural_hash_into(&self, id: NodeId, hasher: &mut impl Hasher) {
        let node = &self.nodes[id.0];
        node.kind.hash(hasher);
        node.modifiers.hash(hasher);
        node.children.len().hash(hasher);
        for &child in &node.children {
            self.structural_hash_into(child, hasher);
        }
    }
}
