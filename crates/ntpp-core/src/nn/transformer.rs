//! Post-norm transformer encoder and decoder layers with GELU feed-forward.

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::activation::gelu;
use super::attention::MultiHeadAttention;
use super::dropout::{Dropout, Noise};
use super::linear::Linear;
use super::norm::LayerNorm;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeedForward {
    up: Linear,
    down: Linear,
}

impl FeedForward {
    fn new(dim: usize, hidden: usize, rng: &mut StdRng) -> Self {
        Self {
            up: Linear::new(dim, hidden, rng),
            down: Linear::new(hidden, dim, rng),
        }
    }

    fn check(&self, dim: usize) -> Result<()> {
        let hidden = self.up.output_dim();
        self.up.check("feed-forward up", dim, hidden)?;
        self.down.check("feed-forward down", hidden, dim)
    }

    fn forward(&self, x: ArrayView2<'_, f64>, dropout: Dropout, noise: Noise<'_>) -> Array2<f64> {
        let hidden = dropout.apply(self.up.forward(x).mapv_into(gelu), noise);
        self.down.forward(hidden.view())
    }
}

/// Self-attention block followed by a feed-forward block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerEncoderLayer {
    self_attn: MultiHeadAttention,
    ff: FeedForward,
    norm1: LayerNorm,
    norm2: LayerNorm,
    dropout: Dropout,
}

impl TransformerEncoderLayer {
    pub fn new(
        dim: usize,
        num_heads: usize,
        ff_dim: usize,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(dim, num_heads, rng)?,
            ff: FeedForward::new(dim, ff_dim, rng),
            norm1: LayerNorm::new(dim),
            norm2: LayerNorm::new(dim),
            dropout: Dropout::new(dropout),
        })
    }

    /// Every sublayer must operate on width `dim`.
    pub fn check(&self, dim: usize) -> Result<()> {
        self.self_attn.check(dim)?;
        self.ff.check(dim)?;
        self.norm1.check("encoder layer norm", dim)?;
        self.norm2.check("encoder layer norm", dim)
    }

    pub fn forward(&self, x: Array2<f64>, causal: bool, mut noise: Noise<'_>) -> Array2<f64> {
        let attn = self.self_attn.forward(x.view(), x.view(), causal);
        let x = self
            .norm1
            .forward(x + self.dropout.apply(attn, noise.as_deref_mut()));
        let ff = self.ff.forward(x.view(), self.dropout, noise.as_deref_mut());
        self.norm2.forward(x + self.dropout.apply(ff, noise))
    }
}

/// Self-attention, cross-attention over a memory, then feed-forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerDecoderLayer {
    self_attn: MultiHeadAttention,
    cross_attn: MultiHeadAttention,
    ff: FeedForward,
    norm1: LayerNorm,
    norm2: LayerNorm,
    norm3: LayerNorm,
    dropout: Dropout,
}

impl TransformerDecoderLayer {
    pub fn new(
        dim: usize,
        num_heads: usize,
        ff_dim: usize,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(dim, num_heads, rng)?,
            cross_attn: MultiHeadAttention::new(dim, num_heads, rng)?,
            ff: FeedForward::new(dim, ff_dim, rng),
            norm1: LayerNorm::new(dim),
            norm2: LayerNorm::new(dim),
            norm3: LayerNorm::new(dim),
            dropout: Dropout::new(dropout),
        })
    }

    /// Every sublayer must operate on width `dim`; the memory shares it.
    pub fn check(&self, dim: usize) -> Result<()> {
        self.self_attn.check(dim)?;
        self.cross_attn.check(dim)?;
        self.ff.check(dim)?;
        for norm in [&self.norm1, &self.norm2, &self.norm3] {
            norm.check("decoder layer norm", dim)?;
        }
        Ok(())
    }

    pub fn forward(
        &self,
        target: Array2<f64>,
        memory: ArrayView2<'_, f64>,
        causal: bool,
        mut noise: Noise<'_>,
    ) -> Array2<f64> {
        let attn = self.self_attn.forward(target.view(), target.view(), causal);
        let x = self
            .norm1
            .forward(target + self.dropout.apply(attn, noise.as_deref_mut()));
        let cross = self.cross_attn.forward(x.view(), memory, false);
        let x = self
            .norm2
            .forward(x + self.dropout.apply(cross, noise.as_deref_mut()));
        let ff = self.ff.forward(x.view(), self.dropout, noise.as_deref_mut());
        self.norm3.forward(x + self.dropout.apply(ff, noise))
    }
}
