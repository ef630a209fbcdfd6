mod arena;
mod display;
mod error;
mod invariants;
mod node;
mod subset;

pub mod aggregation;
pub mod graph;
pub mod planner;

pub use arena::{NodeId, PlanArena};
pub use display::PlanDisplay;
pub use error::PlanError;
pub use node::{FilterExpr, LeafQuery, Modifiers, PlanKind, VarSets};
pub use subset::IndexedSubset;
