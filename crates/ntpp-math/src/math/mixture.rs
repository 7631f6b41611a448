//! Mixture of Weibull distributions for the next inter-event time.
//!
//! A decoder emits `3K` unconstrained values per timestep, laid out as
//! `[log-mean raw (K) | shape raw (K) | weight logits (K)]`. They are mapped to
//! a valid distribution by:
//!
//! - log-mean: `tanh(raw) * 5 ln 10` (mean in `[1e-5, 1e5]`)
//! - shape: `softplus(raw)` clamped to `[0.1, 100]`
//! - log-weights: `log_softmax(raw)` over the K components
//!
//! Density and survival are each a log-sum-exp over components. The hazard is
//! the ratio of the two for the whole mixture, evaluated as the
//! survival-weighted average of component hazards; `ln f - ln S` cancels to
//! nothing once both saturate near `-(t/λ)^k`. The compensator is `-ln S(t)`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bounds::bounded_log_mean;
use super::stable::{log1m_exp, log_softmax, log_sum_exp, softplus};
use super::weibull::WeibullComponent;
use crate::error::{MathError, Result};

/// Weighted mixture of K Weibull components for one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeibullMixture {
    log_weights: Vec<f64>,
    components: Vec<WeibullComponent>,
}

impl WeibullMixture {
    /// Build from raw decoder outputs of length `3K`.
    pub fn from_raw(raw: &[f64]) -> Result<Self> {
        if raw.is_empty() || raw.len() % 3 != 0 {
            return Err(MathError::RawWidth { actual: raw.len() });
        }
        let k = raw.len() / 3;
        let (mean_raw, rest) = raw.split_at(k);
        let (shape_raw, logits) = rest.split_at(k);

        let log_means: Vec<f64> = mean_raw.iter().map(|&r| bounded_log_mean(r)).collect();
        let shapes: Vec<f64> = shape_raw.iter().map(|&r| softplus(r)).collect();
        Self::new(&log_means, &shapes, &log_softmax(logits))
    }

    /// Build from already-constrained parameters.
    ///
    /// Shapes are clamped; `log_weights` are renormalized so they form a simplex.
    pub fn new(log_means: &[f64], shapes: &[f64], log_weights: &[f64]) -> Result<Self> {
        let k = log_means.len();
        if k == 0 {
            return Err(MathError::EmptyMixture);
        }
        if shapes.len() != k {
            return Err(MathError::LengthMismatch {
                what: "shapes",
                expected: k,
                actual: shapes.len(),
            });
        }
        if log_weights.len() != k {
            return Err(MathError::LengthMismatch {
                what: "log_weights",
                expected: k,
                actual: log_weights.len(),
            });
        }
        let components = log_means
            .iter()
            .zip(shapes)
            .map(|(&m, &s)| WeibullComponent::new(m, s))
            .collect();
        Ok(Self {
            log_weights: log_softmax(log_weights),
            components,
        })
    }

    /// Number of components K.
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[WeibullComponent] {
        &self.components
    }

    pub fn log_weights(&self) -> &[f64] {
        &self.log_weights
    }

    /// Mixture weights `exp(log_weights)`.
    pub fn weights(&self) -> Vec<f64> {
        self.log_weights.iter().map(|lw| lw.exp()).collect()
    }

    fn weighted<F>(&self, f: F) -> f64
    where
        F: Fn(&WeibullComponent) -> f64,
    {
        let terms: Vec<f64> = self
            .log_weights
            .iter()
            .zip(&self.components)
            .map(|(lw, c)| lw + f(c))
            .collect();
        log_sum_exp(&terms)
    }

    /// `ln f(t) = LSE_k(ln w_k + ln f_k(t))`.
    pub fn log_density(&self, t: f64) -> f64 {
        self.weighted(|c| c.log_density(t))
    }

    /// `ln S(t) = LSE_k(ln w_k + ln S_k(t))`.
    pub fn log_survival(&self, t: f64) -> f64 {
        self.weighted(|c| c.log_survival(t))
    }

    /// `ln h(t) = ln f(t) - ln S(t)` for the mixture as a whole.
    ///
    /// With `a_k = ln w_k + ln S_k(t)` this is
    /// `LSE_k(a_k - LSE(a) + ln h_k(t))`.
    pub fn log_hazard(&self, t: f64) -> f64 {
        let survival: Vec<f64> = self
            .log_weights
            .iter()
            .zip(&self.components)
            .map(|(lw, c)| lw + c.log_survival(t))
            .collect();
        let norm = log_sum_exp(&survival);
        let terms: Vec<f64> = survival
            .iter()
            .zip(&self.components)
            .map(|(a, c)| a - norm + c.log_hazard(t))
            .collect();
        log_sum_exp(&terms)
    }

    /// `ln F(t) = ln(1 - S(t))`.
    pub fn log_cdf(&self, t: f64) -> f64 {
        log1m_exp(self.log_survival(t).min(0.0))
    }

    /// Cumulative hazard from 0 to `t`: `-ln S(t)`.
    pub fn compensator(&self, t: f64) -> f64 {
        -self.log_survival(t)
    }

    /// `Σ_k w_k E[T_k]`.
    pub fn mean(&self) -> f64 {
        self.log_weights
            .iter()
            .zip(&self.components)
            .map(|(lw, c)| lw.exp() * c.mean())
            .sum()
    }

    /// Draw an inter-event time: pick a component by weight, then invert its survival.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        let mut acc = 0.0;
        let last = self.components.len() - 1;
        for (i, (lw, c)) in self.log_weights.iter().zip(&self.components).enumerate() {
            acc += lw.exp();
            if u < acc || i == last {
                return c.sample(rng);
            }
        }
        self.components[last].sample(rng)
    }
}
