use crate::NodeId;

/// An error raised while building or transforming a query plan.
///
/// Most variants indicate programmer errors in planning code and are raised fail-fast.
/// [PlanError::OverlappingComponents] indicates a planning inconsistency that would silently
/// produce wrong query results, so the corresponding check is never compiled out.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlanError {
    /// A node cannot be registered as its own parent.
    #[error("node {0} cannot be its own parent")]
    SelfParent(NodeId),
    /// Detaching a parent that was never registered.
    #[error("parent {parent} is not registered on node {node}")]
    ParentNotRegistered { node: NodeId, parent: NodeId },
    /// Registering the same parent twice.
    #[error("parent {parent} is already registered on node {node}")]
    DuplicateParent { node: NodeId, parent: NodeId },
    /// Removing a child edge that does not exist.
    #[error("node {child} is not a child of node {parent}")]
    ChildNotFound { parent: NodeId, child: NodeId },
    /// A [NodeId] that does not belong to the arena.
    #[error("unknown plan node {0}")]
    UnknownNode(NodeId),
    /// A derived-variable-set invariant does not hold.
    #[error("plan invariant violated at node {node}: {message}")]
    InvariantViolation { node: NodeId, message: String },
    /// A component handed to the join-order planner is not join-connected.
    #[error("join component {0:?} is not join-connected")]
    NotConnected(Vec<usize>),
    /// The aggregated component partition is not pairwise disjoint.
    #[error("aggregated join components overlap")]
    OverlappingComponents,
}
