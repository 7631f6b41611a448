//! Scaled dot-product multi-head attention.

use ndarray::{s, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::linear::Linear;
use crate::error::{ensure_width, ModelError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiHeadAttention {
    num_heads: usize,
    head_dim: usize,
    q_linear: Linear,
    k_linear: Linear,
    v_linear: Linear,
    out_linear: Linear,
}

impl MultiHeadAttention {
    /// Fails unless `num_heads` is positive and divides `embed_dim`.
    pub fn new(embed_dim: usize, num_heads: usize, rng: &mut StdRng) -> Result<Self> {
        if num_heads == 0 || embed_dim % num_heads != 0 {
            return Err(ModelError::shape("attention heads", embed_dim, num_heads));
        }
        Ok(Self {
            num_heads,
            head_dim: embed_dim / num_heads,
            q_linear: Linear::new(embed_dim, embed_dim, rng),
            k_linear: Linear::new(embed_dim, embed_dim, rng),
            v_linear: Linear::new(embed_dim, embed_dim, rng),
            out_linear: Linear::new(embed_dim, embed_dim, rng),
        })
    }

    /// Heads must tile `embed_dim` and every projection must be square in it.
    pub fn check(&self, embed_dim: usize) -> Result<()> {
        if self.num_heads == 0 {
            return Err(ModelError::shape("attention heads", embed_dim, 0));
        }
        ensure_width("attention head split", embed_dim, self.embed_dim())?;
        self.q_linear.check("attention query", embed_dim, embed_dim)?;
        self.k_linear.check("attention key", embed_dim, embed_dim)?;
        self.v_linear.check("attention value", embed_dim, embed_dim)?;
        self.out_linear.check("attention output", embed_dim, embed_dim)
    }

    pub fn embed_dim(&self) -> usize {
        self.num_heads * self.head_dim
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    /// Attend from `query` rows `(Lq, d)` over `memory` rows `(Lk, d)`.
    ///
    /// With `causal`, query row `i` only sees memory rows `0..=i`.
    pub fn forward(
        &self,
        query: ArrayView2<'_, f64>,
        memory: ArrayView2<'_, f64>,
        causal: bool,
    ) -> Array2<f64> {
        let q = self.q_linear.forward(query);
        let k = self.k_linear.forward(memory);
        let v = self.v_linear.forward(memory);

        let scale = (self.head_dim as f64).sqrt();
        let mut concat = Array2::zeros((q.nrows(), self.embed_dim()));
        for h in 0..self.num_heads {
            let (lo, hi) = (h * self.head_dim, (h + 1) * self.head_dim);
            let mut scores = q.slice(s![.., lo..hi]).dot(&k.slice(s![.., lo..hi]).t()) / scale;
            if causal {
                for ((i, j), score) in scores.indexed_iter_mut() {
                    if j > i {
                        *score = f64::NEG_INFINITY;
                    }
                }
            }
            softmax_rows(&mut scores);
            concat
                .slice_mut(s![.., lo..hi])
                .assign(&scores.dot(&v.slice(s![.., lo..hi])));
        }
        self.out_linear.forward(concat.view())
    }
}

fn softmax_rows(scores: &mut Array2<f64>) {
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        if !max.is_finite() {
            row.fill(0.0);
            continue;
        }
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum().max(1e-300);
        row.mapv_inplace(|v| v / sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn softmax_rows_sum_to_one() {
        let mut scores = array![[1.0, 2.0, f64::NEG_INFINITY], [0.0, 0.0, 0.0]];
        softmax_rows(&mut scores);
        for row in scores.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert_eq!(scores[[0, 2]], 0.0);
    }

    #[test]
    fn causal_rows_ignore_the_future() {
        let mut rng = StdRng::seed_from_u64(11);
        let attn = MultiHeadAttention::new(4, 2, &mut rng).unwrap();
        let x = Array2::from_shape_fn((5, 4), |(i, j)| (i * 4 + j) as f64 * 0.1);
        let full = attn.forward(x.view(), x.view(), true);

        let mut changed = x.clone();
        changed.row_mut(4).fill(9.0);
        let perturbed = attn.forward(changed.view(), changed.view(), true);

        for i in 0..4 {
            for j in 0..4 {
                assert!((full[[i, j]] - perturbed[[i, j]]).abs() < 1e-12);
            }
        }
        assert!((0..4).any(|j| (full[[4, j]] - perturbed[[4, j]]).abs() > 1e-9));
    }

    #[test]
    fn cross_attention_output_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let attn = MultiHeadAttention::new(3, 1, &mut rng).unwrap();
        let out = attn.forward(Array2::ones((2, 3)).view(), Array2::ones((7, 3)).view(), false);
        assert_eq!(out.dim(), (2, 3));
    }

    #[test]
    fn heads_must_divide_width() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(MultiHeadAttention::new(6, 4, &mut rng).unwrap_err().code(), 70);
        assert!(MultiHeadAttention::new(6, 0, &mut rng).is_err());
        assert_eq!(MultiHeadAttention::new(6, 3, &mut rng).unwrap().num_heads(), 3);
    }

    #[test]
    fn check_catches_inconsistent_head_split() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut attn = MultiHeadAttention::new(4, 2, &mut rng).unwrap();
        assert!(attn.check(4).is_ok());
        assert!(attn.check(6).is_err());

        attn.head_dim = 1;
        assert_eq!(attn.check(4).unwrap_err().code(), 70);

        let mut attn = MultiHeadAttention::new(4, 2, &mut rng).unwrap();
        attn.v_linear = Linear::new(4, 3, &mut rng);
        assert!(attn.check(4).is_err());
    }
}
