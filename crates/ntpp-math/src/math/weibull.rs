//! Weibull inter-event time kernel, parameterized by its mean.
//!
//! # Parameterization
//!
//! A component is described by `(m, k)` where `m = ln E[T]` and `k` is the
//! shape. The scale follows from the closed-form mean
//! `E[T] = λ Γ(1 + 1/k)`:
//!
//! ```text
//! ln λ = m - ln Γ(1 + 1/k)
//! z(t) = k (ln t - ln λ)
//! ln S(t) = -exp(z)
//! ln f(t) = ln k - ln t + z - exp(z)
//! ln h(t) = ln k - ln t + z
//! ```
//!
//! Working in `z` keeps every term finite over `t ∈ [1e-10, 1e10]`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bounds::{clamp_shape, clamp_time, SURVIVAL_EXPONENT_CAP};
use super::stable::log_gamma;

/// One Weibull component of a mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeibullComponent {
    log_mean: f64,
    shape: f64,
    log_scale: f64,
}

impl WeibullComponent {
    /// Build a component from its natural-log mean and shape.
    ///
    /// The shape is clamped into the safety bounds.
    pub fn new(log_mean: f64, shape: f64) -> Self {
        let shape = clamp_shape(shape);
        let log_scale = log_mean - log_gamma(1.0 + 1.0 / shape);
        Self {
            log_mean,
            shape,
            log_scale,
        }
    }

    pub fn log_mean(&self) -> f64 {
        self.log_mean
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// Natural log of the Weibull scale `λ`.
    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    /// `z = k (ln t - ln λ)`, capped so `exp(z)` stays finite.
    fn exponent(&self, log_t: f64) -> f64 {
        (self.shape * (log_t - self.log_scale)).min(SURVIVAL_EXPONENT_CAP)
    }

    /// Log density at `t`.
    pub fn log_density(&self, t: f64) -> f64 {
        let log_t = clamp_time(t).ln();
        let z = self.exponent(log_t);
        self.shape.ln() - log_t + z - z.exp()
    }

    /// Log survival `ln P(T > t)`, from the closed form `-(t/λ)^k`.
    pub fn log_survival(&self, t: f64) -> f64 {
        let log_t = clamp_time(t).ln();
        -self.exponent(log_t).exp()
    }

    /// Log hazard `ln f(t) - ln S(t)`.
    pub fn log_hazard(&self, t: f64) -> f64 {
        let log_t = clamp_time(t).ln();
        self.shape.ln() - log_t + self.exponent(log_t)
    }

    /// Closed-form mean `λ Γ(1 + 1/k)`, which is `exp(log_mean)` by construction.
    pub fn mean(&self) -> f64 {
        (self.log_scale + log_gamma(1.0 + 1.0 / self.shape)).exp()
    }

    /// Invert the survival function at a uniform draw.
    ///
    /// `t = λ (-ln U)^(1/k)`
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        // U in [0, 1); shift away from zero so ln stays finite.
        let u = (1.0 - u).max(f64::MIN_POSITIVE);
        let log_t = self.log_scale + (-u.ln()).ln() / self.shape;
        clamp_time(log_t.exp())
    }
}
