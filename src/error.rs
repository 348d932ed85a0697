//! Error types for proxima.

use thiserror::Error;

/// Errors that can occur while building or querying an index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnError {
    /// Dimension mismatch between vectors (ragged input rows, or query vs. dataset).
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// `fit` was called with no rows.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Query issued against an index that has not been fitted.
    #[error("index is empty (fit has not been called)")]
    EmptyIndex,

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Metric identifier not known to the registry.
    #[error("unsupported metric id: {0}")]
    UnsupportedMetric(u8),

    /// Operation not supported by this index variant.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Graph lookup on a vertex that does not exist. Surfacing this from a
    /// query means an internal invariant was broken.
    #[error("unknown vertex: {0}")]
    UnknownVertex(u32),
}

/// Result type alias for proxima operations.
pub type Result<T> = std::result::Result<T, AnnError>;
