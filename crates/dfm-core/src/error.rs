//! Error types for dfm

use thiserror::Error;

/// dfm error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Matrix/vector shapes disagree with each other or with the data.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The series is too short for the requested recursion.
    #[error("Insufficient observations: need at least {required} time steps, got {actual}")]
    InsufficientObservations {
        /// Minimum number of time steps.
        required: usize,
        /// Number of time steps supplied.
        actual: usize,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
