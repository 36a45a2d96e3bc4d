use thiserror::Error;

/// Custom error type for the gradtrack workspace.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum GradTrackError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Shape mismatch during gradient accumulation: expected {expected:?}, got {actual:?}")]
    GradientAccumulationShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },

    #[error("Invalid norm order '{order}': expected a positive number or 'inf'")]
    InvalidNormOrder { order: String },

    #[error("Invalid grad norm aggregation mode '{mode}': expected one of 'parameters', 'optimizer', 'optimizer+parameters'")]
    InvalidAggregationMode { mode: String },

    #[error("Optimizer {optimizer_idx} has no parameters")]
    EmptyOptimizer { optimizer_idx: usize },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}
