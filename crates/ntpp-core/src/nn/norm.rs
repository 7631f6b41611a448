//! Layer normalization over the feature axis.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_width, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNorm {
    gamma: Array1<f64>,
    beta: Array1<f64>,
    eps: f64,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            eps: 1e-5,
        }
    }

    pub fn dim(&self) -> usize {
        self.gamma.len()
    }

    pub fn check(&self, what: &'static str, dim: usize) -> Result<()> {
        ensure_width(what, dim, self.gamma.len())?;
        ensure_width(what, dim, self.beta.len())
    }

    /// Normalize every row to zero mean and unit variance, then scale and shift.
    pub fn forward(&self, mut x: Array2<f64>) -> Array2<f64> {
        for mut row in x.axis_iter_mut(Axis(0)) {
            let n = row.len() as f64;
            let mean = row.sum() / n;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let inv = 1.0 / (var + self.eps).sqrt();
            row.iter_mut()
                .zip(self.gamma.iter().zip(self.beta.iter()))
                .for_each(|(v, (g, b))| *v = (*v - mean) * inv * g + b);
        }
        x
    }
}
