mod hash_join;
mod hash_table;

pub use hash_join::{HashJoinOptions, HashJoinStream};
pub use hash_table::{JoinHashTable, JoinKey};
