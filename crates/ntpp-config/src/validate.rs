//! Configuration validation errors and semantic validation.

use std::collections::HashSet;

use thiserror::Error;

use crate::model::{DecoderKind, ModelConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("unknown {field} kind '{value}' (expected one of: {expected})")]
    UnknownKind {
        field: &'static str,
        value: String,
        expected: String,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::UnknownKind { .. } => 62,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::SemanticError(_) => 63,
        }
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// Validate a model configuration semantically.
pub fn validate_model_config(config: &ModelConfig) -> ValidationResult<()> {
    if config.num_components == 0 {
        return Err(invalid("num_components", "Must be at least 1, got 0".to_string()));
    }

    if config.lookback == 0 {
        return Err(invalid("lookback", "Must be at least 1, got 0".to_string()));
    }

    if !(0.0..1.0).contains(&config.dropout_prob) {
        return Err(invalid(
            "dropout_prob",
            format!("Must be in [0, 1), got {}", config.dropout_prob),
        ));
    }

    if config.hidden_width == Some(0) {
        return Err(invalid("hidden_width", "Must be at least 1, got 0".to_string()));
    }

    if config.attention_layers == 0 && config.decoder == DecoderKind::Transformer {
        return Err(invalid(
            "attention_layers",
            "Transformer decoder needs at least one layer".to_string(),
        ));
    }

    if !(config.log_tau_std.is_finite() && config.log_tau_std > 0.0) {
        return Err(invalid(
            "log_tau_std",
            format!("Must be positive and finite, got {}", config.log_tau_std),
        ));
    }

    if !config.log_tau_mean.is_finite() {
        return Err(invalid("log_tau_mean", "Must be finite".to_string()));
    }

    if !config.mag_mean.is_finite() {
        return Err(invalid("mag_mean", "Must be finite".to_string()));
    }

    let mut seen = HashSet::new();
    for name in &config.supplementary_marks {
        if name.trim().is_empty() {
            return Err(invalid(
                "supplementary_marks",
                "Mark names must be non-empty".to_string(),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(invalid(
                "supplementary_marks",
                format!("Duplicate mark name '{}'", name),
            ));
        }
    }

    if config.decoder == DecoderKind::Transformer && config.num_future_marks() == 0 {
        return Err(ValidationError::SemanticError(
            "Transformer decoder needs future-knowable marks; enable use_injection or use_magnitude"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncoderKind;

    #[test]
    fn default_is_valid() {
        assert!(validate_model_config(&ModelConfig::default()).is_ok());
    }

    #[test]
    fn zero_components_rejected() {
        let config = ModelConfig {
            num_components: 0,
            ..ModelConfig::default()
        };
        let err = validate_model_config(&config).unwrap_err();
        assert_eq!(err.code(), 65);
        assert!(err.to_string().contains("num_components"));
    }

    #[test]
    fn dropout_range_enforced() {
        for p in [-0.1, 1.0, f64::NAN] {
            let config = ModelConfig {
                dropout_prob: p,
                ..ModelConfig::default()
            };
            assert!(validate_model_config(&config).is_err(), "p={p}");
        }
    }

    #[test]
    fn log_tau_std_must_be_positive() {
        let config = ModelConfig {
            log_tau_std: 0.0,
            ..ModelConfig::default()
        };
        assert!(validate_model_config(&config).is_err());
    }

    #[test]
    fn duplicate_supplementary_marks_rejected() {
        let config = ModelConfig {
            supplementary_marks: vec!["Vc".into(), "Vc".into()],
            ..ModelConfig::default()
        };
        let err = validate_model_config(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn transformer_without_future_marks_rejected() {
        let config = ModelConfig {
            decoder: DecoderKind::Transformer,
            encoder: EncoderKind::None,
            use_injection: false,
            use_magnitude: false,
            ..ModelConfig::default()
        };
        let err = validate_model_config(&config).unwrap_err();
        assert_eq!(err.code(), 63);
    }
}
