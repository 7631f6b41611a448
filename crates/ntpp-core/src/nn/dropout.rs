//! Inverted dropout.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Training-time randomness threaded through a forward pass.
///
/// `None` means evaluation: every dropout layer is the identity.
pub type Noise<'a> = Option<&'a mut StdRng>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dropout {
    p: f64,
}

impl Dropout {
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    /// Zero each element with probability `p` and rescale survivors by `1/(1-p)`.
    pub fn apply(&self, x: Array2<f64>, noise: Noise<'_>) -> Array2<f64> {
        match noise {
            Some(rng) if self.p > 0.0 => {
                let keep = 1.0 - self.p;
                x.mapv_into(|v| {
                    if rng.random::<f64>() < keep {
                        v / keep
                    } else {
                        0.0
                    }
                })
            }
            _ => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn identity_without_rng() {
        let x = Array2::from_elem((3, 4), 1.5);
        assert_eq!(Dropout::new(0.5).apply(x.clone(), None), x);
    }

    #[test]
    fn training_zeroes_and_rescales() {
        let mut rng = StdRng::seed_from_u64(3);
        let y = Dropout::new(0.5).apply(Array2::ones((50, 50)), Some(&mut rng));
        assert!(y.iter().all(|&v| v == 0.0 || v == 2.0));
        let kept = y.iter().filter(|&&v| v > 0.0).count();
        assert!(kept > 1000 && kept < 1500, "kept={kept}");
    }
}
