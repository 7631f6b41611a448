//! Decoder input context: marks, optionally joined by the history embedding.

use ndarray::{concatenate, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::encoder::{HistoryEncoder, RecurrentState};
use crate::error::{ModelError, Result};
use crate::nn::Noise;

/// Context tensor and the encoder state reached at its last step.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// `(batch, steps, Dc)` with marks in the first Dm columns.
    pub tensor: Array3<f64>,
    /// `None` when history encoding is disabled.
    pub state: Option<RecurrentState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBuilder {
    encoder: Option<HistoryEncoder>,
}

impl ContextBuilder {
    pub fn new(encoder: Option<HistoryEncoder>) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> Option<&HistoryEncoder> {
        self.encoder.as_ref()
    }

    /// Context width for marks of width `mark_width`.
    pub fn width(&self, mark_width: usize) -> usize {
        if self.encoder.is_some() {
            2 * mark_width
        } else {
            mark_width
        }
    }

    /// Build `[marks | embedding]`, or the marks alone when no encoder is set.
    pub fn build(
        &self,
        marks: &Array3<f64>,
        state: Option<RecurrentState>,
        noise: Noise<'_>,
    ) -> Result<Context> {
        let Some(encoder) = &self.encoder else {
            return Ok(Context {
                tensor: marks.clone(),
                state: None,
            });
        };

        let (embedding, state) = encoder.forward(marks, state, noise)?;
        let tensor = concatenate(Axis(2), &[marks.view(), embedding.view()]).map_err(|_| {
            ModelError::shape("history embedding", marks.len(), embedding.len())
        })?;
        Ok(Context {
            tensor,
            state: Some(state),
        })
    }
}
