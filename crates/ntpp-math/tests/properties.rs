//! Property-based tests for ntpp-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use proptest::prelude::*;
use ntpp_math::bounds::{TIME_MAX, TIME_MIN};
use ntpp_math::{log_add_exp, log_gamma, log_softmax, log_sum_exp, WeibullMixture};

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Extended tolerance for log_gamma where Lanczos approximation has some error.
const LGAMMA_TOL: f64 = 1e-8;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() && b.is_infinite() {
        return a.signum() == b.signum();
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

/// Trapezoid rule on a log-spaced grid: ∫ f(t) dt = ∫ f(e^u) e^u du.
fn integrate_on_log_grid<F: Fn(f64) -> f64>(g: F, n: usize) -> f64 {
    let lo = TIME_MIN.ln();
    let hi = TIME_MAX.ln();
    let du = (hi - lo) / n as f64;
    let mut total = 0.0;
    for i in 0..=n {
        let u = lo + du * i as f64;
        let w = if i == 0 || i == n { 0.5 } else { 1.0 };
        total += w * g(u);
    }
    total * du
}

/// Mixtures whose mass sits well inside [1e-10, 1e10].
fn mixture_strategy() -> impl Strategy<Value = WeibullMixture> {
    (1usize..=4).prop_flat_map(|k| {
        (
            prop::collection::vec(-2.0 * std::f64::consts::LN_10..2.0 * std::f64::consts::LN_10, k),
            prop::collection::vec(0.7..8.0f64, k),
            prop::collection::vec(-3.0..3.0f64, k),
        )
            .prop_map(|(means, shapes, logits)| {
                WeibullMixture::new(&means, &shapes, &logits).expect("valid mixture")
            })
    })
}

fn raw_strategy() -> impl Strategy<Value = Vec<f64>> {
    (1usize..=6).prop_flat_map(|k| prop::collection::vec(-20.0..20.0f64, 3 * k))
}

// ============================================================================
// log_sum_exp properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// log_sum_exp is commutative: order doesn't matter.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        let ab = log_sum_exp(&[a, b]);
        let ba = log_sum_exp(&[b, a]);
        prop_assert!(approx_eq(ab, ba, TOL), "lse([{},{}])={} != lse([{},{}])={}", a, b, ab, b, a, ba);
    }

    /// log_sum_exp is associative: grouping doesn't matter.
    #[test]
    fn log_sum_exp_associative(a in -50.0..50.0f64, b in -50.0..50.0f64, c in -50.0..50.0f64) {
        let direct = log_sum_exp(&[a, b, c]);
        let grouped = log_sum_exp(&[log_sum_exp(&[a, b]), c]);
        prop_assert!(approx_eq(direct, grouped, TOL));
    }

    /// log_add_exp matches log_sum_exp for 2 elements.
    #[test]
    fn log_add_exp_matches_log_sum_exp(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        prop_assert!(approx_eq(log_add_exp(a, b), log_sum_exp(&[a, b]), TOL));
    }

    /// log_softmax always exponentiates to a simplex.
    #[test]
    fn log_softmax_simplex(logits in prop::collection::vec(-500.0..500.0f64, 1..16)) {
        let total: f64 = log_softmax(&logits).iter().map(|v| v.exp()).sum();
        prop_assert!(approx_eq(total, 1.0, 1e-9), "total={}", total);
    }

    /// log_gamma recurrence: log_gamma(z+1) = log_gamma(z) + ln(z).
    #[test]
    fn log_gamma_recurrence(z in 1.0..100.0f64) {
        let expected = log_gamma(z) + z.ln();
        prop_assert!(approx_eq(log_gamma(z + 1.0), expected, LGAMMA_TOL));
    }
}

// ============================================================================
// WeibullMixture properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The density integrates to one over [1e-10, 1e10].
    #[test]
    fn mixture_density_normalizes(mix in mixture_strategy()) {
        let mass = integrate_on_log_grid(|u| (mix.log_density(u.exp()) + u).exp(), 40_000);
        prop_assert!((mass - 1.0).abs() < 1e-3, "mass={}", mass);
    }

    /// The mean equals the weighted sum of closed-form component means.
    #[test]
    fn mixture_mean_is_weighted_sum(mix in mixture_strategy()) {
        let expected: f64 = mix
            .weights()
            .iter()
            .zip(mix.components())
            .map(|(w, c)| w * c.log_mean().exp())
            .sum();
        prop_assert!((mix.mean() - expected).abs() <= 1e-4 * expected.max(1.0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// log_hazard agrees with log_density - log_survival up to the rounding
    /// of the larger term, and stays finite.
    #[test]
    fn mixture_hazard_identity(raw in raw_strategy(), log10_t in -10.0..10.0f64) {
        let mix = WeibullMixture::from_raw(&raw).expect("raw width is 3K");
        let t = 10f64.powf(log10_t);
        let lh = mix.log_hazard(t);
        prop_assert!(lh.is_finite(), "log_hazard({})={}", t, lh);
        let (ld, ls) = (mix.log_density(t), mix.log_survival(t));
        let scale = ld.abs().max(ls.abs()).max(1.0);
        prop_assert!((lh - (ld - ls)).abs() <= 1e-9 * scale, "{} vs {}", lh, ld - ls);
    }

    /// Survival is non-increasing and the compensator non-decreasing in t.
    #[test]
    fn mixture_survival_monotone(raw in raw_strategy(), a in -10.0..10.0f64, b in -10.0..10.0f64) {
        let mix = WeibullMixture::from_raw(&raw).expect("raw width is 3K");
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (t0, t1) = (10f64.powf(lo), 10f64.powf(hi));
        let (s0, s1) = (mix.log_survival(t0), mix.log_survival(t1));
        let slack = 1e-12 * s0.abs().max(1.0);
        prop_assert!(s1 <= s0 + slack, "S({})={} > S({})={}", t1, s1, t0, s0);
        prop_assert!(mix.compensator(t1) + slack >= mix.compensator(t0));
        prop_assert!(s0 <= 1e-12, "log S({})={} above zero", t0, s0);
    }

    /// Raw parameters always map into the safety bounds.
    #[test]
    fn mixture_raw_is_bounded(raw in raw_strategy()) {
        let mix = WeibullMixture::from_raw(&raw).expect("raw width is 3K");
        for c in mix.components() {
            prop_assert!(c.shape() >= 0.1 && c.shape() <= 100.0);
            prop_assert!(c.log_mean().exp() >= 1e-5 * (1.0 - 1e-9));
            prop_assert!(c.log_mean().exp() <= 1e5 * (1.0 + 1e-9));
        }
    }
}
