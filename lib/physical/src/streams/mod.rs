mod chain;
mod decorators;
mod sync;

pub use chain::ChainStream;
pub use decorators::{
    DistinctStream, FilterStream, LimitStream, OptionalStream, ProjectionStream,
    SolutionPredicate,
};
pub use sync::VecSolutionStream;

use fedra_common::error::StreamError;
use fedra_common::BoxSolutionStream;
use tracing::error;

/// Closes every stream, surfacing the first failure.
///
/// Later failures are logged instead of dropped, so an early error never leaves the remaining
/// streams open.
pub async fn close_streams(
    streams: impl IntoIterator<Item = &mut BoxSolutionStream>,
) -> Result<(), StreamError> {
    let mut first_error = None;
    for stream in streams {
        if let Err(e) = stream.close().await {
            if first_error.is_none() {
                first_error = Some(e);
            } else {
                error!(error = %e, "suppressing close failure of wrapped stream");
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}
