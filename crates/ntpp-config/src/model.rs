//! Model configuration types.
//!
//! Every toggle here changes the width of some downstream layer, so the whole
//! struct is validated once before any weights are allocated.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::validate::{validate_model_config, ValidationError, ValidationResult};

/// Recurrent cell used by the history encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum EncoderKind {
    /// Plain tanh recurrence.
    Rnn,
    /// Gated recurrent unit.
    #[default]
    Gru,
    /// Gated recurrence with a separate memory cell.
    Lstm,
    /// No history encoding: the context is the marks alone.
    None,
}

impl EncoderKind {
    pub const NAMES: &'static [&'static str] = &["rnn", "gru", "lstm", "none"];

    /// Whether a history embedding is produced.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, EncoderKind::None)
    }
}

impl FromStr for EncoderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rnn" | "plain" | "plain-recurrent" => Ok(EncoderKind::Rnn),
            "gru" | "gated" | "gated-recurrent" => Ok(EncoderKind::Gru),
            "lstm" | "gated-memory" | "gated-with-memory" => Ok(EncoderKind::Lstm),
            "none" | "off" => Ok(EncoderKind::None),
            _ => Err(ValidationError::UnknownKind {
                field: "encoder",
                value: s.to_string(),
                expected: Self::NAMES.join(", "),
            }),
        }
    }
}

impl TryFrom<String> for EncoderKind {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderKind::Rnn => write!(f, "rnn"),
            EncoderKind::Gru => write!(f, "gru"),
            EncoderKind::Lstm => write!(f, "lstm"),
            EncoderKind::None => write!(f, "none"),
        }
    }
}

/// Architecture mapping context to raw distribution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum DecoderKind {
    /// Feed-forward network with optional lookback.
    #[default]
    Fcn,
    /// Self-attention source stream plus cross-attention target stream.
    Transformer,
}

impl DecoderKind {
    pub const NAMES: &'static [&'static str] = &["fcn", "transformer"];
}

impl FromStr for DecoderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fcn" | "feed-forward" | "feedforward" => Ok(DecoderKind::Fcn),
            "transformer" | "trans" => Ok(DecoderKind::Transformer),
            _ => Err(ValidationError::UnknownKind {
                field: "decoder",
                value: s.to_string(),
                expected: Self::NAMES.join(", "),
            }),
        }
    }
}

impl TryFrom<String> for DecoderKind {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderKind::Fcn => write!(f, "fcn"),
            DecoderKind::Transformer => write!(f, "transformer"),
        }
    }
}

/// What the decoder output is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum HeadKind {
    /// `3K` raw values per step forming a Weibull mixture.
    #[default]
    Mixture,
    /// One raw value per step forming a single mean estimate.
    Point,
}

impl HeadKind {
    pub const NAMES: &'static [&'static str] = &["mixture", "point"];
}

impl FromStr for HeadKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mixture" | "distribution" => Ok(HeadKind::Mixture),
            "point" | "point-estimate" | "lite" => Ok(HeadKind::Point),
            _ => Err(ValidationError::UnknownKind {
                field: "head",
                value: s.to_string(),
                expected: Self::NAMES.join(", "),
            }),
        }
    }
}

impl TryFrom<String> for HeadKind {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for HeadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadKind::Mixture => write!(f, "mixture"),
            HeadKind::Point => write!(f, "point"),
        }
    }
}

/// Complete model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub encoder: EncoderKind,
    pub decoder: DecoderKind,
    pub head: HeadKind,

    /// Mixture component count K.
    pub num_components: usize,
    /// FCN lookback window (1 = current step only).
    pub lookback: usize,
    pub dropout_prob: f64,
    /// FCN hidden layer count.
    pub hidden_layers: usize,
    /// FCN hidden width; defaults to the context width.
    pub hidden_width: Option<usize>,
    /// Transformer layers in each of the source and target stacks.
    pub attention_layers: usize,

    pub use_magnitude: bool,
    pub use_injection: bool,
    pub supplementary_marks: Vec<String>,

    /// Mean of log10 inter-event times used for standardization.
    pub log_tau_mean: f64,
    /// Standard deviation of log10 inter-event times used for standardization.
    pub log_tau_std: f64,
    /// Magnitude centering constant.
    pub mag_mean: f64,

    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderKind::Gru,
            decoder: DecoderKind::Fcn,
            head: HeadKind::Mixture,
            num_components: 1,
            lookback: 1,
            dropout_prob: 0.2,
            hidden_layers: 1,
            hidden_width: None,
            attention_layers: 1,
            use_magnitude: true,
            use_injection: true,
            supplementary_marks: Vec::new(),
            log_tau_mean: 0.0,
            log_tau_std: 2.0,
            mag_mean: 0.0,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// Load, parse and validate a config file. `.toml` files are read as TOML,
    /// everything else as JSON.
    pub fn from_file(path: &std::path::Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> ValidationResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))?;
        config.validated()
    }

    /// Parse and validate a TOML config.
    pub fn from_toml_str(text: &str) -> ValidationResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))?;
        config.validated()
    }

    /// Run semantic validation, returning the config on success.
    pub fn validated(self) -> ValidationResult<Self> {
        validate_model_config(&self)?;
        Ok(self)
    }

    /// Per-event mark width Dm.
    ///
    /// Inter-event time and smoothed seismicity rate are always present.
    pub fn num_marks(&self) -> usize {
        2 + 2 * usize::from(self.use_magnitude)
            + 4 * usize::from(self.use_injection)
            + self.supplementary_marks.len()
    }

    /// Context width Dc: marks, plus an equally wide history embedding when encoding.
    pub fn context_width(&self) -> usize {
        let dm = self.num_marks();
        if self.encoder.is_enabled() {
            2 * dm
        } else {
            dm
        }
    }

    /// Number of exogenous marks known ahead of time.
    pub fn num_future_marks(&self) -> usize {
        3 * usize::from(self.use_injection) + usize::from(self.use_magnitude)
    }

    /// Raw decoder output width per step: 3K for the mixture, 1 for the point head.
    pub fn raw_output_width(&self) -> usize {
        match self.head {
            HeadKind::Mixture => 3 * self.num_components,
            HeadKind::Point => 1,
        }
    }

    /// FCN hidden width, defaulting to the context width.
    pub fn effective_hidden_width(&self) -> usize {
        self.hidden_width.unwrap_or_else(|| self.context_width())
    }
}
