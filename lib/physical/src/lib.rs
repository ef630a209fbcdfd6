pub mod join;
pub mod streams;

pub use join::{HashJoinOptions, HashJoinStream, JoinHashTable};
pub use streams::{
    close_streams, ChainStream, DistinctStream, FilterStream, LimitStream, OptionalStream,
    ProjectionStream, SolutionPredicate, VecSolutionStream,
};
