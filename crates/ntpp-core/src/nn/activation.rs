//! Element-wise activations.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Logistic sigmoid, stable for large |x|.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let ex = x.exp();
        ex / (1.0 + ex)
    }
}

/// GELU, tanh approximation.
pub fn gelu(x: f64) -> f64 {
    const C: f64 = 0.797_884_560_802_865_4; // sqrt(2 / pi)
    0.5 * x * (1.0 + (C * (x + 0.044_715 * x * x * x)).tanh())
}

/// Parametric ReLU with a single learned slope for negative inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PRelu {
    pub alpha: f64,
}

impl Default for PRelu {
    fn default() -> Self {
        Self { alpha: 0.25 }
    }
}

impl PRelu {
    pub fn forward(&self, x: Array2<f64>) -> Array2<f64> {
        let alpha = self.alpha;
        x.mapv_into(|v| if v >= 0.0 { v } else { alpha * v })
    }
}
