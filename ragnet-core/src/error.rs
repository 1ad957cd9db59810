use thiserror::Error;

/// Custom error type for the ragnet framework.
///
/// The layers themselves perform no validation: every variant here is raised
/// either by a tensor operation of the ops backend, by the ragged container, or
/// by the parameter/dimension registry of a [`Model`](crate::model::Model).
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum RagNetError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Rank mismatch during operation {operation}: expected rank {expected}, got {actual}")]
    RankMismatch {
        expected: usize,
        actual: usize,
        operation: String,
    },

    #[error("Incompatible shapes for operation {operation}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        shape1: Vec<usize>,
        shape2: Vec<usize>,
        operation: String,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Ragged lengths sum to {lengths_sum} but the data holds {total_rows} rows")]
    RaggedLengthMismatch { total_rows: usize, lengths_sum: usize },

    #[error("Index out of bounds: index {index} for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Cannot concatenate an empty list of tensors")]
    EmptyTensorList,

    #[error("Parameter '{name}' is not declared on model '{model}'")]
    ParameterNotDeclared { model: String, name: String },

    #[error("Parameter '{name}' of model '{model}' is not set; was the model initialized?")]
    ParameterNotSet { model: String, name: String },

    #[error("Dimension '{name}' is not declared on model '{model}'")]
    DimensionNotDeclared { model: String, name: String },

    #[error("Dimension '{name}' of model '{model}' is not set")]
    DimensionNotSet { model: String, name: String },

    #[error("Attempt to change dimension '{name}' of model '{model}' from {current} to {requested}")]
    DimensionConflict {
        model: String,
        name: String,
        current: usize,
        requested: usize,
    },

    #[error("Shape mismatch during gradient accumulation for '{name}': expected {expected:?}, got {actual:?}")]
    GradientShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Unknown ops backend: {0}")]
    UnknownBackend(String),

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },
}
