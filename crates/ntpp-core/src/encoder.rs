//! Causal recurrent history encoder.
//!
//! Runs an RNN, GRU or LSTM cell over the marks one timestep at a time and wraps
//! the output as `LayerNorm(dropout(rnn_out) + marks)`. The hidden width equals
//! the mark width so the residual needs no projection.
//!
//! Recurrent state is never stored on the encoder. Every call takes an optional
//! starting state and returns the final one, so encoding can resume where a
//! previous call stopped without rescanning history.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use ntpp_config::EncoderKind;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_width, ModelError, Result};
use crate::nn::{sigmoid, Dropout, LayerNorm, Linear, Noise};

/// Recurrent cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrentCell {
    Rnn,
    Gru,
    Lstm,
}

impl RecurrentCell {
    /// Cell for a configured encoder kind; `None` when encoding is disabled.
    pub fn from_kind(kind: EncoderKind) -> Option<Self> {
        match kind {
            EncoderKind::Rnn => Some(RecurrentCell::Rnn),
            EncoderKind::Gru => Some(RecurrentCell::Gru),
            EncoderKind::Lstm => Some(RecurrentCell::Lstm),
            EncoderKind::None => None,
        }
    }

    fn gates(self) -> usize {
        match self {
            RecurrentCell::Rnn => 1,
            RecurrentCell::Gru => 3,
            RecurrentCell::Lstm => 4,
        }
    }
}

/// Carried recurrent state, one row per sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentState {
    pub hidden: Array2<f64>,
    /// LSTM memory cell; `None` for RNN and GRU.
    pub cell: Option<Array2<f64>>,
}

impl RecurrentState {
    pub fn zeros(cell: RecurrentCell, batch: usize, width: usize) -> Self {
        Self {
            hidden: Array2::zeros((batch, width)),
            cell: (cell == RecurrentCell::Lstm).then(|| Array2::zeros((batch, width))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEncoder {
    cell: RecurrentCell,
    /// Gate pre-activations from the input, `(gates * H, D)`.
    input_proj: Linear,
    /// Gate pre-activations from the hidden state, `(gates * H, H)`.
    hidden_proj: Linear,
    norm: LayerNorm,
    dropout: Dropout,
}

impl HistoryEncoder {
    pub fn new(cell: RecurrentCell, width: usize, dropout: f64, rng: &mut StdRng) -> Self {
        let gates = cell.gates() * width;
        Self {
            cell,
            input_proj: Linear::new(width, gates, rng),
            hidden_proj: Linear::new(width, gates, rng),
            norm: LayerNorm::new(width),
            dropout: Dropout::new(dropout),
        }
    }

    pub fn cell(&self) -> RecurrentCell {
        self.cell
    }

    /// Mark width D (and hidden width H).
    pub fn width(&self) -> usize {
        self.input_proj.input_dim()
    }

    /// Encode `(batch, steps, D)` marks.
    ///
    /// Returns the `(batch, steps, D)` embedding and the state after the last step.
    pub fn forward(
        &self,
        marks: &Array3<f64>,
        state: Option<RecurrentState>,
        mut noise: Noise<'_>,
    ) -> Result<(Array3<f64>, RecurrentState)> {
        let (b, l, d) = marks.dim();
        ensure_width("encoder input", self.width(), d)?;

        let mut state = match state {
            Some(state) => {
                self.check_state(&state, b)?;
                state
            }
            None => RecurrentState::zeros(self.cell, b, d),
        };

        let mut raw = Array3::zeros((b, l, d));
        for t in 0..l {
            let x = marks.index_axis(Axis(1), t);
            state = self.step(x, state);
            raw.index_axis_mut(Axis(1), t).assign(&state.hidden);
        }

        let mut embedding = Array3::zeros((b, l, d));
        for i in 0..b {
            let out = raw.index_axis(Axis(0), i).to_owned();
            let residual = self.dropout.apply(out, noise.as_deref_mut())
                + &marks.index_axis(Axis(0), i);
            embedding
                .index_axis_mut(Axis(0), i)
                .assign(&self.norm.forward(residual));
        }
        Ok((embedding, state))
    }

    /// Gate projections and the residual norm must agree on the mark width.
    pub fn check(&self, width: usize) -> Result<()> {
        let gates = self.cell.gates() * width;
        self.input_proj.check("encoder input projection", width, gates)?;
        self.hidden_proj.check("encoder hidden projection", width, gates)?;
        self.norm.check("encoder norm", width)
    }

    fn check_state(&self, state: &RecurrentState, batch: usize) -> Result<()> {
        let expected = (batch, self.width());
        let shape_ok = state.hidden.dim() == expected
            && match (&state.cell, self.cell) {
                (Some(c), RecurrentCell::Lstm) => c.dim() == expected,
                (None, RecurrentCell::Lstm) => false,
                (None, _) => true,
                (Some(_), _) => false,
            };
        if shape_ok {
            Ok(())
        } else {
            Err(ModelError::InvalidRequest(format!(
                "recurrent state does not fit a {:?} encoder over {} sequences of width {}",
                self.cell,
                batch,
                self.width()
            )))
        }
    }

    /// One timestep for every sequence in the batch.
    fn step(&self, x: ArrayView2<'_, f64>, state: RecurrentState) -> RecurrentState {
        let h = self.width();
        let gi = self.input_proj.forward(x);
        let gh = self.hidden_proj.forward(state.hidden.view());

        match self.cell {
            RecurrentCell::Rnn => RecurrentState {
                hidden: (gi + gh).mapv_into(f64::tanh),
                cell: None,
            },
            RecurrentCell::Gru => {
                let prev = state.hidden;
                let mut next = Array2::zeros(prev.dim());
                for ((row, unit), out) in next.indexed_iter_mut() {
                    let r = sigmoid(gi[[row, unit]] + gh[[row, unit]]);
                    let z = sigmoid(gi[[row, h + unit]] + gh[[row, h + unit]]);
                    let n = (gi[[row, 2 * h + unit]] + r * gh[[row, 2 * h + unit]]).tanh();
                    *out = (1.0 - z) * n + z * prev[[row, unit]];
                }
                RecurrentState {
                    hidden: next,
                    cell: None,
                }
            }
            RecurrentCell::Lstm => {
                let gates = gi + gh;
                let prev_cell = state
                    .cell
                    .unwrap_or_else(|| Array2::zeros(state.hidden.dim()));
                let input = gates.slice(s![.., 0..h]).mapv(sigmoid);
                let forget = gates.slice(s![.., h..2 * h]).mapv(sigmoid);
                let candidate = gates.slice(s![.., 2 * h..3 * h]).mapv(f64::tanh);
                let output = gates.slice(s![.., 3 * h..4 * h]).mapv(sigmoid);

                let cell = forget * &prev_cell + input * candidate;
                let hidden = output * cell.mapv(f64::tanh);
                RecurrentState {
                    hidden,
                    cell: Some(cell),
                }
            }
        }
    }
}
