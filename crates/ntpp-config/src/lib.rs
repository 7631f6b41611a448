//! Configuration for the injection-seismicity TPP engine.
//!
//! This crate provides:
//! - Typed model configuration with JSON and TOML loading
//! - Fail-fast parsing of encoder, decoder and head kinds
//! - Semantic validation
//! - Config path resolution (explicit → env → XDG → defaults)

pub mod model;
pub mod resolve;
pub mod validate;

pub use model::{DecoderKind, EncoderKind, HeadKind, ModelConfig};
pub use resolve::{resolve_config, ConfigSource, ResolvedConfig};
pub use validate::{validate_model_config, ValidationError, ValidationResult};
