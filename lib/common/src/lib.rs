mod cardinality;
pub mod error;
mod source;
mod stream;

pub use cardinality::{Cardinality, ReliabilityTier};
pub use source::{Source, SourceQuery, SourceRef};
pub use stream::{BoxSolutionStream, SolutionStream};
