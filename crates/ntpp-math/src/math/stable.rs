//! Log-domain primitives used by the mixture kernels.
//!
//! Non-finite inputs follow IEEE conventions: NaN propagates, `-inf` terms
//! drop out of sums, and a single `+inf` term saturates the result.

use std::f64::consts::{LN_2, PI};

/// `ln(sqrt(2 pi))`.
const HALF_LN_TWO_PI: f64 = 0.918_938_533_204_672_8;

/// Lanczos approximation, g = 7, n = 9.
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// `ln(1 + e^x) == x` in f64 beyond this magnitude.
const SOFTPLUS_CUTOFF: f64 = 35.0;

/// `ln Σ exp(v_i)` without overflow. Empty input gives `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, |m, v| {
        if m.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            m.max(v)
        }
    });
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// `ln(e^a + e^b)`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi.is_nan() || lo.is_nan() {
        f64::NAN
    } else if lo == f64::NEG_INFINITY || hi == f64::INFINITY {
        hi
    } else {
        hi + (lo - hi).exp().ln_1p()
    }
}

/// `ln(1 - e^x)` for `x <= 0`; NaN above zero.
///
/// Uses `expm1` near zero and `ln_1p` further out.
pub fn log1m_exp(x: f64) -> f64 {
    match x {
        x if x.is_nan() || x > 0.0 => f64::NAN,
        x if x == 0.0 => f64::NEG_INFINITY,
        x if x > -LN_2 => (-x.exp_m1()).ln(),
        x => (-x.exp()).ln_1p(),
    }
}

/// `ln(1 + e^x)`.
pub fn softplus(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF {
        x
    } else if x < -SOFTPLUS_CUTOFF {
        x.exp()
    } else {
        x.exp().ln_1p()
    }
}

/// Normalized log-weights `x_i - ln Σ exp(x)`.
pub fn log_softmax(logits: &[f64]) -> Vec<f64> {
    let norm = log_sum_exp(logits);
    logits.iter().map(|&x| x - norm).collect()
}

/// `ln |Γ(z)|`; NaN at the poles `z = 0, -1, -2, ...`.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return z;
    }
    if z < 0.5 {
        // Γ(z) Γ(1 - z) = π / sin(πz)
        let s = (PI * z).sin();
        if (z <= 0.0 && z == z.round()) || s == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - s.abs().ln() - log_gamma(1.0 - z);
    }

    let x = z - 1.0;
    let series = LANCZOS[1..]
        .iter()
        .zip(1u32..)
        .fold(LANCZOS[0], |acc, (c, i)| acc + c / (x + f64::from(i)));
    let t = x + LANCZOS_G + 0.5;
    HALF_LN_TWO_PI + (x + 0.5) * t.ln() - t + series.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1.0)
    }

    #[test]
    fn lse_of_equal_terms() {
        assert!(close(log_sum_exp(&[0.0, 0.0, 0.0]), 3.0f64.ln(), 1e-12));
        assert!(close(log_sum_exp(&[-1000.0, 0.0]), 0.0, 1e-12));
    }

    #[test]
    fn lse_edge_inputs() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY; 2]), f64::NEG_INFINITY);
        assert_eq!(log_sum_exp(&[1.0, f64::INFINITY]), f64::INFINITY);
        assert!(log_sum_exp(&[0.0, f64::NAN]).is_nan());
        // saturated survival terms in a wide mixture
        let v = log_sum_exp(&[-1e300, -1e300]);
        assert!(v.is_finite() && v < -1e299);
    }

    #[test]
    fn log_add_exp_agrees_with_lse() {
        for (a, b) in [(1.234, -0.75), (-3.0, -3.0), (-700.0, 2.0)] {
            assert!(close(log_add_exp(a, b), log_sum_exp(&[a, b]), 1e-12));
        }
        assert_eq!(log_add_exp(f64::NEG_INFINITY, -2.0), -2.0);
        assert!(log_add_exp(f64::NAN, 0.0).is_nan());
    }

    #[test]
    fn log1m_exp_matches_direct_formula() {
        for x in [-1e-8, -0.3, -LN_2, -2.0, -30.0] {
            let direct = (1.0 - x.exp()).ln();
            assert!(close(log1m_exp(x), direct, 1e-6));
        }
        assert_eq!(log1m_exp(0.0), f64::NEG_INFINITY);
        assert!(log1m_exp(0.1).is_nan());
    }

    #[test]
    fn softplus_is_smooth_across_cutoff() {
        assert!(close(softplus(0.0), LN_2, 1e-12));
        assert!(close(softplus(SOFTPLUS_CUTOFF), SOFTPLUS_CUTOFF, 1e-14));
        assert_eq!(softplus(80.0), 80.0);
        assert!(softplus(-80.0) > 0.0);
    }

    #[test]
    fn log_softmax_sums_to_one() {
        let lw = log_softmax(&[3.0, -2.0, 0.5, 700.0]);
        let total: f64 = lw.iter().map(|v| v.exp()).sum();
        assert!(close(total, 1.0, 1e-12));
    }

    #[test]
    fn log_gamma_at_weibull_mean_arguments() {
        // Γ(1 + 1/k) for shapes 1, 2 and 0.5
        assert!(close(log_gamma(2.0), 0.0, 1e-12));
        assert!(close(log_gamma(1.5), (PI.sqrt() / 2.0).ln(), 1e-10));
        assert!(close(log_gamma(3.0), 2.0f64.ln(), 1e-10));
        // Γ(11) = 10! for the smallest allowed shape
        assert!(close(log_gamma(11.0), 3_628_800.0f64.ln(), 1e-10));
    }

    #[test]
    fn log_gamma_reflection_and_poles() {
        assert!(close(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
        assert!(close(log_gamma(-0.5), (2.0 * PI.sqrt()).ln(), 1e-10));
        assert!(log_gamma(0.0).is_nan());
        assert!(log_gamma(-3.0).is_nan());
    }
}
