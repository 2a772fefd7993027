use thiserror::Error;

/// Error taxonomy shared by every ember-ml crate.
///
/// All failures are local and synchronous at the offending call; nothing in
/// the library retries or substitutes defaults for invalid input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MlError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("index {index} out of bounds for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("{0} must be fitted before use")]
    NotFitted(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("singular matrix: system has no unique solution")]
    SingularMatrix,

    #[error("empty input")]
    EmptyInput,

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type MlResult<T> = Result<T, MlError>;
