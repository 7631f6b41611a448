//! Masked L1 residuals of log10 inter-event times.
//!
//! The prediction made at step `s - 1` is compared with the inter-event time
//! observed at step `s`. Only steps in `[2, L - 2)` contribute: the first two
//! lack enough causal history and the last two lack a complete successor.

use std::ops::Range;

use ndarray::{Array1, Array2};
use ntpp_math::bounds::log10_time;

use crate::batch::Batch;
use crate::error::{ensure_width, Result};

/// Steps excluded at the start of every sequence.
pub const LEADING_EXCLUDED: usize = 2;
/// Steps excluded at the end of every sequence.
pub const TRAILING_EXCLUDED: usize = 2;

/// Observed steps whose residual counts toward the loss.
pub fn active_steps(steps: usize) -> Range<usize> {
    LEADING_EXCLUDED..steps.saturating_sub(TRAILING_EXCLUDED).max(LEADING_EXCLUDED)
}

/// Per-sequence L1 residual together with how many steps contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    pub per_sequence: Array1<f64>,
    pub active_counts: Vec<usize>,
}

/// L1 norm of `log10(predicted[s - 1]) - log10(observed[s])` over active, unmasked steps.
///
/// `predicted` is `(batch, steps)` expected inter-event times aligned with the batch.
pub fn masked_l1_residual(predicted: &Array2<f64>, batch: &Batch) -> Result<Residual> {
    let (b, l) = batch.inter_times.dim();
    ensure_width("predicted batch", b, predicted.nrows())?;
    ensure_width("predicted steps", l, predicted.ncols())?;

    let mut per_sequence = Array1::zeros(b);
    let mut active_counts = vec![0; b];
    for i in 0..b {
        for s in active_steps(l) {
            if !batch.mask[[i, s]] {
                continue;
            }
            let r = log10_time(predicted[[i, s - 1]]) - log10_time(batch.inter_times[[i, s]]);
            per_sequence[i] += r.abs();
            active_counts[i] += 1;
        }
    }
    Ok(Residual {
        per_sequence,
        active_counts,
    })
}

/// Divide each sequence's total by its event count.
pub fn normalize_by_events(total: Array1<f64>, end_idx: &[usize]) -> Array1<f64> {
    let mut total = total;
    for (v, &n) in total.iter_mut().zip(end_idx) {
        *v /= n.max(1) as f64;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Sequence;

    #[test]
    fn active_range_excludes_edges() {
        assert_eq!(active_steps(5), 2..3);
        assert_eq!(active_steps(10), 2..8);
        assert!(active_steps(4).is_empty());
        assert!(active_steps(0).is_empty());
    }

    #[test]
    fn residual_uses_previous_prediction() {
        let seq = Sequence::new(vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0]);
        let batch = Batch::from_sequences(&[seq]).unwrap();
        // predictions equal to the next observation except at step 2 -> 3
        let predicted = Array2::from_shape_vec((1, 6), vec![1.0, 4.0, 80.0, 16.0, 1.0, 1.0]).unwrap();
        let res = masked_l1_residual(&predicted, &batch).unwrap();
        assert_eq!(res.active_counts, vec![2]);
        assert!((res.per_sequence[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn masked_steps_skipped() {
        let a = Sequence::new(vec![1.0; 8]);
        let b = Sequence::new(vec![1.0; 4]);
        let batch = Batch::from_sequences(&[a, b]).unwrap();
        let predicted = Array2::from_elem((2, 8), 10.0);
        let res = masked_l1_residual(&predicted, &batch).unwrap();
        assert_eq!(res.active_counts, vec![4, 2]);
        assert!((res.per_sequence[0] - 4.0).abs() < 1e-12);
        assert!((res.per_sequence[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn prediction_shape_checked() {
        let batch = Batch::from_sequences(&[Sequence::new(vec![1.0; 5])]).unwrap();
        assert!(masked_l1_residual(&Array2::ones((1, 4)), &batch).is_err());
    }

    #[test]
    fn normalization_divides_by_event_count() {
        let out = normalize_by_events(Array1::from(vec![6.0, 6.0]), &[3, 0]);
        assert_eq!(out.to_vec(), vec![2.0, 6.0]);
    }
}
