//! Error types for graph construction and engine setup.
//!
//! Per-target failures (a command exiting non-zero, a spawn error) are not
//! errors at this level: they end up as [`crate::TargetState::Failure`] in the
//! run report.

use thiserror::Error;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A dependency edge would close a cycle.
    #[error("dependency cycle: {} (while adding {from} -> {to})", .cycle.join(" -> "))]
    CyclicGraph {
        /// The dependency side of the offending edge
        from: String,
        /// The consumer side of the offending edge
        to: String,
        /// Target names along the cycle, first and last entry equal
        cycle: Vec<String>,
    },

    /// Two targets share a name.
    #[error("target {0} is declared more than once")]
    DuplicateTarget(String),

    /// A focus pattern is not a valid regular expression.
    #[error("invalid target pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Preparing the state directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Graph lookup failed.
    #[error(transparent)]
    Graph(#[from] restamp_graph::GraphError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
