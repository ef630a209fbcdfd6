mod graph_pattern_rewriter;

pub(crate) use graph_pattern_rewriter::GraphPatternRewriter;
