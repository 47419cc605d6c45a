use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffusionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index {index} out of bounds for a table of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// The noise model returned a tensor whose shape differs from its input.
    #[error("model output shape {got:?} does not match input shape {expected:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, DiffusionError>;
