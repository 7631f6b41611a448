//! Neural temporal point process engine for injection-induced seismicity.
//!
//! This library provides:
//! - Mark assembly from event catalogues and injection covariates
//! - Recurrent history encoding (RNN, GRU, LSTM)
//! - FCN and transformer distribution decoders behind one trait
//! - Weibull-mixture and point output heads
//! - Fit and split-point forecast losses
//! - Intensity, compensator and likelihood evaluation
//! - Structured logging setup

pub mod batch;
pub mod context;
pub mod decoder;
pub mod distribution;
pub mod encoder;
pub mod error;
pub mod forecast;
pub mod logging;
pub mod loss;
pub mod marks;
pub mod model;
pub mod nn;

pub use batch::{Batch, Sequence};
pub use context::{Context, ContextBuilder};
pub use decoder::{DecodeMode, Decoder, DecoderWeights};
pub use distribution::{InterTimeDistribution, InterTimeEstimate};
pub use encoder::{HistoryEncoder, RecurrentCell, RecurrentState};
pub use error::{ErrorCategory, ModelError, Result};
pub use forecast::ForecastController;
pub use marks::MarkAssembler;
pub use model::{Curve, ForecastCurve, ModelWeights, Oracle};

pub use ntpp_config::{DecoderKind, EncoderKind, HeadKind, ModelConfig};
pub use ntpp_math::WeibullMixture;
