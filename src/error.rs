//! Error taxonomy shared by all flows
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FlowError>;

/// Everything that can go wrong while building, solving or persisting a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// Missing or invalid mesh, boundary tag or parameter
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Nonlinear or linear solve did not meet its tolerance
    #[error("no convergence after {iterations} iterations (residual {residual:.3e}): {reason}")]
    Convergence {
        /// Newton iterations taken before giving up
        iterations: usize,
        /// Last residual norm
        residual: f64,
        /// Short description of the failure
        reason: String,
    },

    /// Checkpoint could not be written or does not match the flow
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Underlying file system failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not available for this flow variant
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Capability a flow variant is required to provide but does not
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl FlowError {
    /// Linear solve failure wrapped as a convergence error
    pub(crate) fn singular(reason: impl Into<String>) -> Self {
        Self::Convergence {
            iterations: 0,
            residual: f64::NAN,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Checkpoint(e.to_string())
    }
}
