//! Split-point forecast evaluation.
//!
//! A split `i` in `[1, L - 1)` pretends only steps `[0, i)` have been observed.
//! The decoder is re-run in forecast mode anchored at `i`; its predictions for
//! `[i, L)` replace the fit-mode predictions there, and the stitched sequence
//! is scored with the same masked residual as the fit pass.
//!
//! Exhaustive plans visit every split and average over `L` terms (the fit term
//! plus `L - 1`); sampled plans draw `n` distinct splits from the caller's RNG
//! and average over `n + 1` terms.

use ndarray::{s, Array1, Array2};
use rand::seq::index;
use rand::Rng;
use tracing::trace;

use crate::batch::Batch;
use crate::error::{ensure_width, ModelError, Result};
use crate::logging::event_names;
use crate::loss::masked_l1_residual;

/// The splits to evaluate and the averaging divisor for the combined loss.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastController {
    splits: Vec<usize>,
    divisor: f64,
}

impl ForecastController {
    /// Every split in `[1, steps - 1)`.
    pub fn exhaustive(steps: usize) -> Self {
        Self {
            splits: (1..steps.saturating_sub(1)).collect(),
            divisor: steps as f64,
        }
    }

    /// `count` distinct splits drawn uniformly from `[1, steps - 1)`, ascending.
    pub fn sampled<R: Rng + ?Sized>(steps: usize, count: usize, rng: &mut R) -> Result<Self> {
        let available = steps.saturating_sub(2);
        if count > available {
            return Err(ModelError::InvalidRequest(format!(
                "forecast_count {count} exceeds the {available} available split points"
            )));
        }
        let mut splits: Vec<usize> = index::sample(rng, available, count)
            .into_iter()
            .map(|i| i + 1)
            .collect();
        splits.sort_unstable();
        Ok(Self {
            splits,
            divisor: (count + 1) as f64,
        })
    }

    /// Exhaustive for `count == 0`, sampled otherwise.
    pub fn plan<R: Rng + ?Sized>(steps: usize, count: usize, rng: &mut R) -> Result<Self> {
        if count == 0 {
            Ok(Self::exhaustive(steps))
        } else {
            Self::sampled(steps, count, rng)
        }
    }

    pub fn splits(&self) -> &[usize] {
        &self.splits
    }

    /// Number of terms the combined loss is averaged over.
    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    /// Steps `[0, split)` from `fit`, steps `[split, L)` from `forecast`.
    pub fn stitch(fit: &Array2<f64>, forecast: &Array2<f64>, split: usize) -> Result<Array2<f64>> {
        let (b, l) = fit.dim();
        if split == 0 || split >= l {
            return Err(ModelError::InvalidRequest(format!(
                "split index {split} outside [1, {l})"
            )));
        }
        ensure_width("forecast batch", b, forecast.nrows())?;
        ensure_width("forecast steps", l - split, forecast.ncols())?;

        let mut out = fit.clone();
        out.slice_mut(s![.., split..]).assign(forecast);
        Ok(out)
    }

    /// Sum of stitched residuals over all planned splits.
    ///
    /// `forecast` returns the `(batch, L - split)` forecast-mode predictions for a split.
    pub fn forecast_residual<F>(
        &self,
        fit_predictions: &Array2<f64>,
        batch: &Batch,
        mut forecast: F,
    ) -> Result<Array1<f64>>
    where
        F: FnMut(usize) -> Result<Array2<f64>>,
    {
        let mut total = Array1::zeros(batch.batch_size());
        for &split in &self.splits {
            let stitched = Self::stitch(fit_predictions, &forecast(split)?, split)?;
            let residual = masked_l1_residual(&stitched, batch)?;
            trace!(
                event = event_names::FORECAST_SPLIT_EVALUATED,
                split,
                residual_sum = residual.per_sequence.sum(),
                "forecast split evaluated"
            );
            total += &residual.per_sequence;
        }
        Ok(total)
    }
}
