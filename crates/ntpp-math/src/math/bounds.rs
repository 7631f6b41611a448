//! Numeric safety bounds shared by mark assembly and the mixture head.
//!
//! Every clamp applied anywhere in the engine reads its limits from here.

use std::f64::consts::LN_10;

/// Smallest inter-event time considered, in the catalog's time unit.
pub const TIME_MIN: f64 = 1e-10;
/// Largest inter-event time considered.
pub const TIME_MAX: f64 = 1e10;

/// Magnitudes are clamped to this symmetric range before centering.
pub const MAGNITUDE_LIMIT: f64 = 10.0;

/// Pre-scaled injection and supplementary marks are clamped to this range.
pub const MARK_LIMIT: f64 = 10.0;

/// Decimal orders of magnitude the mean inter-event time may span either side of 1.
pub const LOG10_MEAN_SPAN: f64 = 5.0;

/// Multiplier applied to `tanh(raw)` to obtain a natural-log mean: `5 * ln(10)`.
pub const LOG_MEAN_SCALE: f64 = LOG10_MEAN_SPAN * LN_10;

/// Lower bound on the Weibull shape after softplus.
pub const SHAPE_MIN: f64 = 0.1;
/// Upper bound on the Weibull shape after softplus.
pub const SHAPE_MAX: f64 = 100.0;

/// Cap on `k * ln(t / scale)` before exponentiation in the survival term.
///
/// Keeps `-exp(z)` finite so log-sum-exp over components never sees `-inf`
/// from both numerator and denominator of the hazard.
pub const SURVIVAL_EXPONENT_CAP: f64 = 700.0;

/// Clamp an inter-event time into `[TIME_MIN, TIME_MAX]`. NaN maps to `TIME_MIN`.
pub fn clamp_time(t: f64) -> f64 {
    if t.is_nan() {
        return TIME_MIN;
    }
    t.clamp(TIME_MIN, TIME_MAX)
}

/// `log10` of a clamped inter-event time.
pub fn log10_time(t: f64) -> f64 {
    clamp_time(t).log10()
}

/// Clamp a magnitude into `[-MAGNITUDE_LIMIT, MAGNITUDE_LIMIT]`.
pub fn clamp_magnitude(m: f64) -> f64 {
    if m.is_nan() {
        return 0.0;
    }
    m.clamp(-MAGNITUDE_LIMIT, MAGNITUDE_LIMIT)
}

/// Clamp a pre-scaled covariate mark into `[-MARK_LIMIT, MARK_LIMIT]`.
pub fn clamp_mark(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(-MARK_LIMIT, MARK_LIMIT)
}

/// Clamp a Weibull shape into `[SHAPE_MIN, SHAPE_MAX]`.
pub fn clamp_shape(k: f64) -> f64 {
    if k.is_nan() {
        return SHAPE_MIN;
    }
    k.clamp(SHAPE_MIN, SHAPE_MAX)
}

/// Map an unconstrained decoder output to a natural-log mean in
/// `[-LOG_MEAN_SCALE, LOG_MEAN_SCALE]`.
pub fn bounded_log_mean(raw: f64) -> f64 {
    raw.tanh() * LOG_MEAN_SCALE
}
