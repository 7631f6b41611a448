//! Error types for the TPP engine.
//!
//! Errors carry a stable numeric code and a category so callers driving
//! training or evaluation loops can group failures without string matching.

use ntpp_config::ValidationError;
use ntpp_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration or construction errors.
    Config,
    /// Tensor shape disagreements.
    Shape,
    /// Malformed input batches or sequences.
    Input,
    /// Invalid call arguments (split index, forecast count).
    Request,
    /// Distribution construction errors.
    Math,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Shape => write!(f, "shape"),
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Request => write!(f, "request"),
            ErrorCategory::Math => write!(f, "math"),
        }
    }
}

/// Unified error type for the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("configuration error: {0}")]
    Config(#[from] ValidationError),

    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("distribution error: {0}")]
    Math(#[from] MathError),
}

impl ModelError {
    /// Stable error code.
    pub fn code(&self) -> u32 {
        match self {
            ModelError::Config(inner) => inner.code(),
            ModelError::ShapeMismatch { .. } => 70,
            ModelError::InvalidBatch(_) => 71,
            ModelError::InvalidRequest(_) => 72,
            ModelError::Math(_) => 73,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::Config(_) => ErrorCategory::Config,
            ModelError::ShapeMismatch { .. } => ErrorCategory::Shape,
            ModelError::InvalidBatch(_) => ErrorCategory::Input,
            ModelError::InvalidRequest(_) => ErrorCategory::Request,
            ModelError::Math(_) => ErrorCategory::Math,
        }
    }

    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        ModelError::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }
}

/// Fail with a shape error unless `actual == expected`.
pub(crate) fn ensure_width(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ModelError::shape(what, expected, actual))
    }
}
