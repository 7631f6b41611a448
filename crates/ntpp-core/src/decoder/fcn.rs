//! Feed-forward decoder with optional lookback.
//!
//! Per output step the network sees
//! `[lookback window | forecast flag | future-knowable marks of that step]`.
//! The lookback window is the current context row plus the `lookback - 1`
//! rows before it, oldest first, left-padded with [`LOOKBACK_PAD`].
//!
//! In forecast mode anchored at split `i` the window ending at row `i - 1` is
//! repeated for every step in `[i, L)` with the flag set to 1. Only the
//! future-knowable marks change from step to step; predicted inter-event
//! times are never fed back.

use ndarray::{s, Array2, ArrayView2, Axis};
use ntpp_config::DecoderKind;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::{check_future_indices, DecodeMode, Decoder, DecoderWeights};
use crate::error::{ModelError, Result};
use crate::nn::{Dropout, Linear, Noise, PRelu};

/// Fill value for lookback rows before the start of the sequence.
pub const LOOKBACK_PAD: f64 = -10.0;

/// Sizes of an FCN decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct FcnLayout {
    pub context_width: usize,
    pub lookback: usize,
    pub hidden_width: usize,
    pub hidden_layers: usize,
    pub output_width: usize,
    pub dropout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HiddenLayer {
    linear: Linear,
    activation: PRelu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcnDecoder {
    context_width: usize,
    lookback: usize,
    future_indices: Vec<usize>,
    input_layer: Linear,
    input_activation: PRelu,
    hidden: Vec<HiddenLayer>,
    output_layer: Linear,
    dropout: Dropout,
}

impl FcnDecoder {
    pub fn new(layout: &FcnLayout, future_indices: Vec<usize>, rng: &mut StdRng) -> Result<Self> {
        if layout.lookback == 0 {
            return Err(ModelError::InvalidRequest(
                "lookback must be at least 1".to_string(),
            ));
        }
        check_future_indices(&future_indices, layout.context_width)?;

        let input_width = layout.context_width * layout.lookback + 1 + future_indices.len();
        let hidden = (0..layout.hidden_layers)
            .map(|_| HiddenLayer {
                linear: Linear::new(layout.hidden_width, layout.hidden_width, rng),
                activation: PRelu::default(),
            })
            .collect();

        Ok(Self {
            context_width: layout.context_width,
            lookback: layout.lookback,
            future_indices,
            input_layer: Linear::new(input_width, layout.hidden_width, rng),
            input_activation: PRelu::default(),
            hidden,
            output_layer: Linear::new(layout.hidden_width, layout.output_width, rng),
            dropout: Dropout::new(layout.dropout),
        })
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn future_indices(&self) -> &[usize] {
        &self.future_indices
    }

    /// Column of the forecast flag in the prepared input.
    pub fn flag_column(&self) -> usize {
        self.context_width * self.lookback
    }

    pub fn input_layer(&self) -> &Linear {
        &self.input_layer
    }

    pub fn input_layer_mut(&mut self) -> &mut Linear {
        &mut self.input_layer
    }

    /// Lookback windows for every row: `(steps, Dc * lookback)`.
    fn windows(&self, context: ArrayView2<'_, f64>) -> Array2<f64> {
        let (l, d) = context.dim();
        let mut out = Array2::from_elem((l, d * self.lookback), LOOKBACK_PAD);
        for t in 0..l {
            for k in 0..self.lookback {
                // slot k holds row t - (lookback - 1 - k)
                let back = self.lookback - 1 - k;
                if back <= t {
                    out.slice_mut(s![t, k * d..(k + 1) * d])
                        .assign(&context.row(t - back));
                }
            }
        }
        out
    }

    /// Assemble the network input for the requested mode.
    fn prepare(&self, context: ArrayView2<'_, f64>, mode: DecodeMode) -> Array2<f64> {
        let steps = context.nrows();
        let windows = self.windows(context);
        let future = context.select(Axis(1), &self.future_indices);
        let flag_col = self.flag_column();
        let width = flag_col + 1 + self.future_indices.len();

        let (first, flag) = match mode {
            DecodeMode::Fit => (0, 0.0),
            DecodeMode::Forecast { split } => (split, 1.0),
        };
        let mut input = Array2::zeros((steps - first, width));
        for (row, t) in (first..steps).enumerate() {
            let source = match mode {
                DecodeMode::Fit => t,
                DecodeMode::Forecast { split } => split - 1,
            };
            input
                .slice_mut(s![row, ..flag_col])
                .assign(&windows.row(source));
            input[[row, flag_col]] = flag;
            input
                .slice_mut(s![row, flag_col + 1..])
                .assign(&future.row(t));
        }
        input
    }
}

impl Decoder for FcnDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Fcn
    }

    fn input_width(&self) -> usize {
        self.context_width
    }

    fn output_width(&self) -> usize {
        self.output_layer.output_dim()
    }

    fn decode_sequence(
        &self,
        context: ArrayView2<'_, f64>,
        mode: DecodeMode,
        mut noise: Noise<'_>,
    ) -> Result<Array2<f64>> {
        mode.check(context.nrows())?;
        let input = self.prepare(context, mode);

        let mut x = self.input_activation.forward(
            self.dropout
                .apply(self.input_layer.forward(input.view()), noise.as_deref_mut()),
        );
        for layer in &self.hidden {
            x = layer.activation.forward(
                self.dropout
                    .apply(layer.linear.forward(x.view()), noise.as_deref_mut()),
            );
        }
        let x = self.dropout.apply(x, noise);
        Ok(self.output_layer.forward(x.view()))
    }

    fn check(&self) -> Result<()> {
        check_future_indices(&self.future_indices, self.context_width)?;
        let mut width = self.input_layer.output_dim();
        self.input_layer.check(
            "fcn input layer",
            self.flag_column() + 1 + self.future_indices.len(),
            width,
        )?;
        for layer in &self.hidden {
            let next = layer.linear.output_dim();
            layer.linear.check("fcn hidden layer", width, next)?;
            width = next;
        }
        self.output_layer
            .check("fcn output layer", width, self.output_layer.output_dim())
    }

    fn snapshot(&self) -> DecoderWeights {
        DecoderWeights::Fcn(self.clone())
    }
}
