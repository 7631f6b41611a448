//! Per-step inter-event-time predictions.
//!
//! The mixture head turns each `3K`-wide raw row into a [`WeibullMixture`];
//! the point head turns a single raw value into a bounded mean inter-event
//! time. Both reduce to an expected inter-event time per step, which is what
//! the fit and forecast residuals compare against observations.

use ndarray::{Array2, Array3, Axis, Zip};
use ntpp_config::HeadKind;
use ntpp_math::bounds::bounded_log_mean;
use ntpp_math::WeibullMixture;

use crate::error::{ensure_width, ModelError, Result};

/// A `(batch, steps)` grid of mixture distributions.
#[derive(Debug, Clone, PartialEq)]
pub struct InterTimeDistribution {
    mixtures: Array2<WeibullMixture>,
}

impl InterTimeDistribution {
    /// Build from `(batch, steps, 3K)` raw decoder output.
    pub fn from_raw(raw: &Array3<f64>) -> Result<Self> {
        let (b, l, _) = raw.dim();
        let mut mixtures = Vec::with_capacity(b * l);
        for row in raw.lanes(Axis(2)) {
            let values: Vec<f64> = row.iter().copied().collect();
            mixtures.push(WeibullMixture::from_raw(&values)?);
        }
        let mixtures = Array2::from_shape_vec((b, l), mixtures)
            .map_err(|_| ModelError::shape("mixture grid", b * l, raw.len()))?;
        Ok(Self { mixtures })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.mixtures.dim()
    }

    pub fn get(&self, batch: usize, step: usize) -> Option<&WeibullMixture> {
        self.mixtures.get((batch, step))
    }

    pub fn mixtures(&self) -> &Array2<WeibullMixture> {
        &self.mixtures
    }

    fn eval(&self, t: &Array2<f64>, f: impl Fn(&WeibullMixture, f64) -> f64) -> Result<Array2<f64>> {
        let (b, l) = self.dim();
        ensure_width("evaluation batch", b, t.nrows())?;
        ensure_width("evaluation steps", l, t.ncols())?;
        Ok(Zip::from(&self.mixtures)
            .and(t)
            .map_collect(|m, &t| f(m, t)))
    }

    pub fn log_density(&self, t: &Array2<f64>) -> Result<Array2<f64>> {
        self.eval(t, WeibullMixture::log_density)
    }

    pub fn log_survival(&self, t: &Array2<f64>) -> Result<Array2<f64>> {
        self.eval(t, WeibullMixture::log_survival)
    }

    pub fn log_hazard(&self, t: &Array2<f64>) -> Result<Array2<f64>> {
        self.eval(t, WeibullMixture::log_hazard)
    }

    pub fn compensator(&self, t: &Array2<f64>) -> Result<Array2<f64>> {
        self.eval(t, WeibullMixture::compensator)
    }

    pub fn mean(&self) -> Array2<f64> {
        self.mixtures.map(WeibullMixture::mean)
    }
}

/// Decoder output mapped through the configured head.
#[derive(Debug, Clone, PartialEq)]
pub enum InterTimeEstimate {
    Distribution(InterTimeDistribution),
    /// Bounded mean inter-event time per step.
    Point(Array2<f64>),
}

impl InterTimeEstimate {
    /// Map `(batch, steps, width)` raw output through `head`.
    pub fn from_raw(head: HeadKind, raw: &Array3<f64>) -> Result<Self> {
        match head {
            HeadKind::Mixture => Ok(Self::Distribution(InterTimeDistribution::from_raw(raw)?)),
            HeadKind::Point => {
                ensure_width("point head output", 1, raw.len_of(Axis(2)))?;
                Ok(Self::Point(
                    raw.index_axis(Axis(2), 0)
                        .mapv(|r| bounded_log_mean(r).exp()),
                ))
            }
        }
    }

    /// Expected inter-event time per step: the mixture mean or the point value.
    pub fn expected_inter_times(&self) -> Array2<f64> {
        match self {
            Self::Distribution(dist) => dist.mean(),
            Self::Point(values) => values.clone(),
        }
    }

    pub fn as_distribution(&self) -> Option<&InterTimeDistribution> {
        match self {
            Self::Distribution(dist) => Some(dist),
            Self::Point(_) => None,
        }
    }
}
