//! Distribution decoders: context in, raw distribution parameters out.
//!
//! Both architectures implement [`Decoder`] and are chosen once, when the model
//! is built. Call sites only ever see `dyn Decoder`.
//!
//! In fit mode a decoder returns one output row per context step. In forecast
//! mode anchored at split `i` it sees only the observed prefix `[0, i)` plus the
//! future-knowable marks of steps `[i, L)`, and returns `L - i` rows.

use std::fmt;

use ndarray::{Array2, Array3, ArrayView2, Axis};
use ntpp_config::{DecoderKind, ModelConfig};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_width, ModelError, Result};
use crate::nn::Noise;

pub mod fcn;
pub mod transformer;

pub use fcn::{FcnDecoder, FcnLayout};
pub use transformer::{TransformerDecoder, TransformerLayout};

/// Which pass a decoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// One prediction per step from the full causal context.
    Fit,
    /// Predictions for steps `[split, L)` using only the prefix `[0, split)`.
    Forecast { split: usize },
}

impl DecodeMode {
    pub fn new(forecasting: bool, split_index: usize) -> Self {
        if forecasting {
            DecodeMode::Forecast { split: split_index }
        } else {
            DecodeMode::Fit
        }
    }

    /// Check the split against a sequence of `steps` steps: `1 <= split < steps`.
    pub fn check(self, steps: usize) -> Result<()> {
        match self {
            DecodeMode::Fit => Ok(()),
            DecodeMode::Forecast { split } if split >= 1 && split < steps => Ok(()),
            DecodeMode::Forecast { split } => Err(ModelError::InvalidRequest(format!(
                "split index {split} outside [1, {steps})"
            ))),
        }
    }

    /// Output rows produced for a sequence of `steps` steps.
    pub fn output_steps(self, steps: usize) -> usize {
        match self {
            DecodeMode::Fit => steps,
            DecodeMode::Forecast { split } => steps.saturating_sub(split),
        }
    }
}

/// Maps a context sequence to raw distribution parameters.
pub trait Decoder: fmt::Debug + Send + Sync {
    fn kind(&self) -> DecoderKind;

    /// Context width Dc expected on input.
    fn input_width(&self) -> usize;

    /// Raw parameter width per output step.
    fn output_width(&self) -> usize;

    /// Decode one `(steps, Dc)` context. The mode has already been checked.
    fn decode_sequence(
        &self,
        context: ArrayView2<'_, f64>,
        mode: DecodeMode,
        noise: Noise<'_>,
    ) -> Result<Array2<f64>>;

    /// Internal consistency of the layer stack, re-run after restoring weights.
    fn check(&self) -> Result<()>;

    /// Serializable copy of the weights.
    fn snapshot(&self) -> DecoderWeights;

    /// Decode a `(batch, steps, Dc)` context into `(batch, out_steps, output_width)`.
    fn forward(
        &self,
        context: &Array3<f64>,
        mode: DecodeMode,
        mut noise: Noise<'_>,
    ) -> Result<Array3<f64>> {
        let (b, l, d) = context.dim();
        ensure_width("decoder input", self.input_width(), d)?;
        mode.check(l)?;

        let mut out = Array3::zeros((b, mode.output_steps(l), self.output_width()));
        for i in 0..b {
            let raw = self.decode_sequence(context.index_axis(Axis(0), i), mode, noise.as_deref_mut())?;
            ensure_width("decoder output", self.output_width(), raw.ncols())?;
            out.index_axis_mut(Axis(0), i).assign(&raw);
        }
        Ok(out)
    }
}

/// Persistable decoder weights, tagged by architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoderWeights {
    Fcn(FcnDecoder),
    Transformer(TransformerDecoder),
}

impl DecoderWeights {
    /// Check the restored stack and box it.
    pub fn into_decoder(self) -> Result<Box<dyn Decoder>> {
        let decoder: Box<dyn Decoder> = match self {
            DecoderWeights::Fcn(d) => Box::new(d),
            DecoderWeights::Transformer(d) => Box::new(d),
        };
        decoder.check()?;
        Ok(decoder)
    }
}

/// Build the configured decoder with freshly initialized weights.
pub fn build_decoder(
    config: &ModelConfig,
    future_indices: Vec<usize>,
    rng: &mut StdRng,
) -> Result<Box<dyn Decoder>> {
    let output_width = config.raw_output_width();
    let decoder: Box<dyn Decoder> = match config.decoder {
        DecoderKind::Fcn => {
            let layout = FcnLayout {
                context_width: config.context_width(),
                lookback: config.lookback,
                hidden_width: config.effective_hidden_width(),
                hidden_layers: config.hidden_layers,
                output_width,
                dropout: config.dropout_prob,
            };
            Box::new(FcnDecoder::new(&layout, future_indices, rng)?)
        }
        DecoderKind::Transformer => {
            let layout = TransformerLayout {
                context_width: config.context_width(),
                source_heads: config.num_marks(),
                layers: config.attention_layers,
                ff_width: 2 * config.context_width(),
                output_width,
                dropout: config.dropout_prob,
            };
            Box::new(TransformerDecoder::new(&layout, future_indices, rng)?)
        }
    };
    Ok(decoder)
}

/// Check that every future-knowable index addresses a context column.
pub(crate) fn check_future_indices(indices: &[usize], context_width: usize) -> Result<()> {
    match indices.iter().find(|&&i| i >= context_width) {
        Some(&bad) => Err(ModelError::InvalidRequest(format!(
            "future mark index {bad} outside context width {context_width}"
        ))),
        None => Ok(()),
    }
}
