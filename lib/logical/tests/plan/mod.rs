mod aggregation;
mod join_graph;
mod plan_arena;
mod test_utils;
