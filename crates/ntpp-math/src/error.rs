//! Error types for distribution construction.

use thiserror::Error;

/// Result type for math operations that can reject their inputs.
pub type Result<T> = std::result::Result<T, MathError>;

/// Errors raised when building distributions from raw parameters.
///
/// Evaluation never fails: out-of-range inputs are clamped to the bounds in
/// [`crate::bounds`]. Only structurally wrong parameter vectors are rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// The raw parameter vector does not split into three equal blocks.
    #[error("raw mixture parameters must have length 3*K, got {actual}")]
    RawWidth { actual: usize },

    /// A mixture needs at least one component.
    #[error("mixture must have at least one component")]
    EmptyMixture,

    /// Parameter blocks disagree in length.
    #[error("parameter length mismatch: {what} has {actual}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
