//! Per-event mark assembly.
//!
//! Column layout of the marks tensor, in order:
//!
//! | column | present when |
//! |---|---|
//! | standardized log10 inter-event time | always |
//! | smoothed seismicity rate | always |
//! | magnitude, completeness magnitude | `use_magnitude` |
//! | injection rate, volume change, sign, time since sign change | `use_injection` |
//! | supplementary marks, in configured order | listed |

use ndarray::{Array2, Array3, Axis};
use ntpp_config::ModelConfig;
use ntpp_math::bounds::{clamp_magnitude, clamp_mark, log10_time};
use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::error::{ModelError, Result};

/// Builds the fixed-width marks tensor from batch fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAssembler {
    use_magnitude: bool,
    use_injection: bool,
    supplementary: Vec<String>,
    log_tau_mean: f64,
    log_tau_std: f64,
    mag_mean: f64,
}

impl MarkAssembler {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            use_magnitude: config.use_magnitude,
            use_injection: config.use_injection,
            supplementary: config.supplementary_marks.clone(),
            log_tau_mean: config.log_tau_mean,
            log_tau_std: config.log_tau_std,
            mag_mean: config.mag_mean,
        }
    }

    /// Mark width Dm.
    pub fn width(&self) -> usize {
        2 + 2 * usize::from(self.use_magnitude)
            + 4 * usize::from(self.use_injection)
            + self.supplementary.len()
    }

    /// Columns of marks that are known ahead of time: injection rate, sign,
    /// time since sign change, then completeness magnitude.
    pub fn future_indices(&self) -> Vec<usize> {
        let mag_offset = 2;
        let inj_offset = mag_offset + 2 * usize::from(self.use_magnitude);
        let mut indices = Vec::with_capacity(4);
        if self.use_injection {
            indices.extend([inj_offset, inj_offset + 2, inj_offset + 3]);
        }
        if self.use_magnitude {
            indices.push(mag_offset + 1);
        }
        indices
    }

    /// Standardized log10 inter-event time.
    pub fn time_mark(&self, dt: f64) -> f64 {
        (log10_time(dt) - self.log_tau_mean) / self.log_tau_std
    }

    /// Assemble the `(batch, steps, Dm)` marks tensor.
    pub fn assemble(&self, batch: &Batch) -> Result<Array3<f64>> {
        let (b, l) = batch.inter_times.dim();
        let mut columns: Vec<Array2<f64>> = Vec::with_capacity(self.width());

        columns.push(batch.inter_times.mapv(|dt| self.time_mark(dt)));
        columns.push(batch.seismicity_rate.mapv(clamp_mark));

        if self.use_magnitude {
            columns.push(batch.magnitudes.mapv(|m| clamp_magnitude(m) - self.mag_mean));
            let mc = Array2::from_shape_fn((b, l), |(i, _)| {
                clamp_magnitude(batch.mag_completeness[i]) - self.mag_mean
            });
            columns.push(mc);
        }

        if self.use_injection {
            for field in [
                &batch.injection_rate,
                &batch.volume_change,
                &batch.injection_sign,
                &batch.time_since_sign_change,
            ] {
                columns.push(field.mapv(clamp_mark));
            }
        }

        for name in &self.supplementary {
            let values = batch.supplementary.get(name).ok_or_else(|| {
                ModelError::InvalidBatch(format!("missing supplementary mark '{name}'"))
            })?;
            if values.dim() != (b, l) {
                return Err(ModelError::InvalidBatch(format!(
                    "supplementary mark '{name}' has shape {:?}, expected {:?}",
                    values.dim(),
                    (b, l)
                )));
            }
            columns.push(values.mapv(clamp_mark));
        }

        let mut marks = Array3::zeros((b, l, columns.len()));
        for (d, column) in columns.iter().enumerate() {
            marks.index_axis_mut(Axis(2), d).assign(column);
        }
        Ok(marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Sequence;
    use ntpp_config::EncoderKind;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn sample_batch() -> Batch {
        let seq = Sequence::new(vec![1.0, 100.0, 1e-20])
            .with_magnitudes(vec![1.5, 2.0, 50.0], 0.5)
            .with_injection(
                vec![1.0, 2.0, 3.0],
                vec![0.1, 0.2, 0.3],
                vec![1.0, -1.0, 1.0],
                vec![4.0, 5.0, 60.0],
            )
            .with_seismicity_rate(vec![0.5, 0.6, 0.7])
            .with_supplementary("Pm", vec![-20.0, 0.0, 1.0]);
        Batch::from_sequences(&[seq]).unwrap()
    }

    #[test]
    fn layout_and_transforms() {
        let config = ModelConfig {
            supplementary_marks: vec!["Pm".into()],
            log_tau_mean: 1.0,
            log_tau_std: 2.0,
            mag_mean: 1.0,
            ..ModelConfig::default()
        };
        let assembler = MarkAssembler::new(&config);
        assert_eq!(assembler.width(), config.num_marks());

        let marks = assembler.assemble(&sample_batch()).unwrap();
        assert_eq!(marks.dim(), (1, 3, 9));

        // (log10(100) - 1) / 2
        assert!(approx_eq(marks[[0, 1, 0]], 0.5, 1e-12));
        // 1e-20 clamps to 1e-10
        assert!(approx_eq(marks[[0, 2, 0]], (-10.0 - 1.0) / 2.0, 1e-12));
        assert_eq!(marks[[0, 0, 1]], 0.5);
        assert_eq!(marks[[0, 0, 2]], 0.5);
        assert_eq!(marks[[0, 2, 2]], 9.0);
        assert_eq!(marks[[0, 1, 3]], -0.5);
        assert_eq!(marks[[0, 1, 4]], 2.0);
        assert_eq!(marks[[0, 2, 7]], 10.0);
        assert_eq!(marks[[0, 0, 8]], -10.0);
    }

    #[test]
    fn toggles_shrink_width() {
        let config = ModelConfig {
            use_magnitude: false,
            use_injection: false,
            encoder: EncoderKind::None,
            ..ModelConfig::default()
        };
        let assembler = MarkAssembler::new(&config);
        let marks = assembler.assemble(&sample_batch()).unwrap();
        assert_eq!(marks.dim(), (1, 3, 2));
        assert!(assembler.future_indices().is_empty());
    }

    #[test]
    fn future_indices_follow_layout() {
        let full = MarkAssembler::new(&ModelConfig::default());
        assert_eq!(full.future_indices(), vec![4, 6, 7, 3]);

        let injection_only = MarkAssembler::new(&ModelConfig {
            use_magnitude: false,
            ..ModelConfig::default()
        });
        assert_eq!(injection_only.future_indices(), vec![2, 4, 5]);

        let magnitude_only = MarkAssembler::new(&ModelConfig {
            use_injection: false,
            ..ModelConfig::default()
        });
        assert_eq!(magnitude_only.future_indices(), vec![3]);
    }

    #[test]
    fn missing_supplementary_mark_is_an_error() {
        let config = ModelConfig {
            supplementary_marks: vec!["Eh".into()],
            ..ModelConfig::default()
        };
        let err = MarkAssembler::new(&config)
            .assemble(&sample_batch())
            .unwrap_err();
        assert!(err.to_string().contains("Eh"));
    }
}
