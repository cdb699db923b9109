//! Errors surfaced by the reachability driver.

use crate::Epoch;

/// Result alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Ways a computation can fail to produce a result.
///
/// Missing adjacency is not an error (a vertex without outgoing edges simply proposes nothing),
/// and aggregate functions are infallible; a worker that panics is reported as `Runtime`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The configuration cannot be used to run a computation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The dataflow runtime failed to start, or a worker did not complete.
    #[error("dataflow runtime failure: {0}")]
    Runtime(String),
    /// The iteration bound was reached while labels were still changing.
    #[error("epoch {epoch} did not converge within {iterations} iterations")]
    DidNotConverge {
        /// The epoch that was being computed.
        epoch: Epoch,
        /// The number of rounds that were run.
        iterations: u32,
    },
}

impl From<getopts::Fail> for Error {
    fn from(fail: getopts::Fail) -> Self {
        Error::Config(fail.to_string())
    }
}
