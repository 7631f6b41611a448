//! Fully connected layer.

use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_width, Result};

/// `y = x W^T + b` applied row-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// Shape `(output_dim, input_dim)`.
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Linear {
    /// Xavier/Glorot normal initialization with zero bias.
    pub fn new(input_dim: usize, output_dim: usize, rng: &mut StdRng) -> Self {
        let scale = (2.0 / (input_dim + output_dim).max(1) as f64).sqrt();
        let weights = Array2::from_shape_fn((output_dim, input_dim), |_| {
            let z: f64 = rng.sample(StandardNormal);
            z * scale
        });
        Self {
            weights,
            bias: Array1::zeros(output_dim),
        }
    }

    /// Build from explicit parameters. Returns `None` if the bias length does
    /// not match the weight rows.
    pub fn from_parts(weights: Array2<f64>, bias: Array1<f64>) -> Option<Self> {
        (weights.nrows() == bias.len()).then_some(Self { weights, bias })
    }

    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.dot(&self.weights.t()) + &self.bias
    }

    pub fn input_dim(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.weights.nrows()
    }

    /// Fail unless the layer maps `input` features to `output` with a
    /// matching bias.
    pub fn check(&self, what: &'static str, input: usize, output: usize) -> Result<()> {
        ensure_width(what, input, self.input_dim())?;
        ensure_width(what, output, self.output_dim())?;
        ensure_width(what, output, self.bias.len())
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Array2<f64> {
        &mut self.weights
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    pub fn bias_mut(&mut self) -> &mut Array1<f64> {
        &mut self.bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn forward_applies_affine_map() {
        let layer = Linear::from_parts(array![[1.0, 2.0], [0.0, -1.0], [3.0, 0.0]], array![0.5, 0.0, -1.0])
            .unwrap();
        let y = layer.forward(array![[1.0, 1.0], [2.0, 0.0]].view());
        assert_eq!(y, array![[3.5, -1.0, 2.0], [2.5, 0.0, 5.0]]);
        assert_eq!(layer.input_dim(), 2);
        assert_eq!(layer.output_dim(), 3);
    }

    #[test]
    fn init_is_seeded() {
        let a = Linear::new(4, 3, &mut StdRng::seed_from_u64(7));
        let b = Linear::new(4, 3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.bias().iter().all(|&v| v == 0.0));
        assert!(a.weights().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn from_parts_checks_bias() {
        assert!(Linear::from_parts(Array2::zeros((2, 3)), Array1::zeros(3)).is_none());
    }

    #[test]
    fn check_covers_both_sides_and_bias() {
        let mut layer = Linear::new(4, 3, &mut StdRng::seed_from_u64(1));
        assert!(layer.check("layer", 4, 3).is_ok());
        assert_eq!(layer.check("layer", 5, 3).unwrap_err().code(), 70);
        assert_eq!(layer.check("layer", 4, 2).unwrap_err().code(), 70);
        *layer.bias_mut() = Array1::zeros(2);
        assert!(layer.check("layer", 4, 3).is_err());
    }
}
