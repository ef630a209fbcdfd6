use fedra_common::error::{SourceError, StreamError};
use fedra_logical::PlanError;

/// An error raised while planning or evaluating a federated query.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryEvaluationError {
    /// The query string could not be parsed.
    #[error(transparent)]
    Parsing(#[from] spargebra::SparqlSyntaxError),
    /// Planning produced or detected an inconsistent plan.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// A solution stream failed during evaluation.
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// A federation member failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// A plan references a source that is not registered.
    #[error("no source named {0} is registered")]
    UnknownSource(String),
    /// The query uses a feature outside the supported fragment.
    #[error("unsupported query feature: {0}")]
    Unsupported(String),
}

impl QueryEvaluationError {
    pub(crate) fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }
}
