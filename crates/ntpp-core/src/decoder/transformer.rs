//! Source/target transformer decoder.
//!
//! The source stream is the context passed through self-attention encoder
//! layers. In fit mode it is causally masked over the whole sequence and a
//! fit head projects it directly. In forecast mode the source is only the
//! observed prefix, unmasked; a bridge projects it into a memory that the
//! target stream (future-knowable marks of the forecast steps) attends to
//! through cross-attention decoder layers, and a forecast head projects the
//! target.

use ndarray::{s, Array2, ArrayView2, Axis};
use ntpp_config::DecoderKind;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::{check_future_indices, DecodeMode, Decoder, DecoderWeights};
use crate::error::{ensure_width, ModelError, Result};
use crate::nn::{Dropout, Linear, Noise, TransformerDecoderLayer, TransformerEncoderLayer};

/// Sizes of a transformer decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerLayout {
    pub context_width: usize,
    /// Attention heads in the source stack; must divide `context_width`.
    pub source_heads: usize,
    /// Layers in each of the source and target stacks.
    pub layers: usize,
    pub ff_width: usize,
    pub output_width: usize,
    pub dropout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerDecoder {
    context_width: usize,
    future_indices: Vec<usize>,
    source_layers: Vec<TransformerEncoderLayer>,
    target_layers: Vec<TransformerDecoderLayer>,
    bridge: Linear,
    fit_head: Linear,
    forecast_head: Linear,
    dropout: Dropout,
}

impl TransformerDecoder {
    pub fn new(
        layout: &TransformerLayout,
        future_indices: Vec<usize>,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let dc = layout.context_width;
        let dt = future_indices.len();
        if dt == 0 {
            return Err(ModelError::InvalidRequest(
                "transformer decoder needs at least one future-knowable mark".to_string(),
            ));
        }
        if layout.source_heads == 0 || dc % layout.source_heads != 0 {
            return Err(ModelError::shape(
                "transformer source heads",
                dc,
                layout.source_heads,
            ));
        }
        check_future_indices(&future_indices, dc)?;

        let source_layers = (0..layout.layers)
            .map(|_| {
                TransformerEncoderLayer::new(dc, layout.source_heads, layout.ff_width, layout.dropout, rng)
            })
            .collect::<Result<Vec<_>>>()?;
        let target_layers = (0..layout.layers)
            .map(|_| TransformerDecoderLayer::new(dt, 1, layout.ff_width, layout.dropout, rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            context_width: dc,
            future_indices,
            source_layers,
            target_layers,
            bridge: Linear::new(dc, dt, rng),
            fit_head: Linear::new(dc, layout.output_width, rng),
            forecast_head: Linear::new(dt, layout.output_width, rng),
            dropout: Dropout::new(layout.dropout),
        })
    }

    pub fn future_indices(&self) -> &[usize] {
        &self.future_indices
    }

    fn encode_source(&self, source: Array2<f64>, causal: bool, mut noise: Noise<'_>) -> Array2<f64> {
        self.source_layers
            .iter()
            .fold(source, |x, layer| layer.forward(x, causal, noise.as_deref_mut()))
    }
}

impl Decoder for TransformerDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Transformer
    }

    fn input_width(&self) -> usize {
        self.context_width
    }

    fn output_width(&self) -> usize {
        self.fit_head.output_dim()
    }

    fn decode_sequence(
        &self,
        context: ArrayView2<'_, f64>,
        mode: DecodeMode,
        mut noise: Noise<'_>,
    ) -> Result<Array2<f64>> {
        mode.check(context.nrows())?;
        match mode {
            DecodeMode::Fit => {
                let source = self.encode_source(context.to_owned(), true, noise.as_deref_mut());
                let source = self.dropout.apply(source, noise);
                Ok(self.fit_head.forward(source.view()))
            }
            DecodeMode::Forecast { split } => {
                let prefix = context.slice(s![..split, ..]).to_owned();
                let source = self.encode_source(prefix, false, noise.as_deref_mut());
                let memory = self.bridge.forward(source.view());

                let target = context
                    .slice(s![split.., ..])
                    .select(Axis(1), &self.future_indices);
                let target = self.target_layers.iter().fold(target, |x, layer| {
                    layer.forward(x, memory.view(), false, noise.as_deref_mut())
                });
                let target = self.dropout.apply(target, noise);
                Ok(self.forecast_head.forward(target.view()))
            }
        }
    }

    fn check(&self) -> Result<()> {
        check_future_indices(&self.future_indices, self.context_width)?;
        let dt = self.future_indices.len();
        for layer in &self.source_layers {
            layer.check(self.context_width)?;
        }
        for layer in &self.target_layers {
            layer.check(dt)?;
        }
        ensure_width("transformer bridge input", self.context_width, self.bridge.input_dim())?;
        ensure_width("transformer bridge output", dt, self.bridge.output_dim())?;
        ensure_width("transformer fit head", self.context_width, self.fit_head.input_dim())?;
        ensure_width("transformer forecast head", dt, self.forecast_head.input_dim())?;
        ensure_width(
            "transformer head widths",
            self.fit_head.output_dim(),
            self.forecast_head.output_dim(),
        )
    }

    fn snapshot(&self) -> DecoderWeights {
        DecoderWeights::Transformer(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use rand::SeedableRng;

    fn decoder() -> TransformerDecoder {
        let layout = TransformerLayout {
            context_width: 4,
            source_heads: 2,
            layers: 2,
            ff_width: 8,
            output_width: 3,
            dropout: 0.1,
        };
        TransformerDecoder::new(&layout, vec![1, 3], &mut StdRng::seed_from_u64(21)).unwrap()
    }

    fn context() -> Array3<f64> {
        Array3::from_shape_fn((2, 6, 4), |(b, t, d)| ((b * 24 + t * 4 + d) as f64 * 0.37).cos())
    }

    #[test]
    fn fit_mode_is_causal() {
        let dec = decoder();
        let ctx = context();
        let base = dec.forward(&ctx, DecodeMode::Fit, None).unwrap();
        assert_eq!(base.dim(), (2, 6, 3));

        let mut changed = ctx.clone();
        changed.slice_mut(s![.., 5, ..]).fill(3.0);
        let out = dec.forward(&changed, DecodeMode::Fit, None).unwrap();
        for ((idx, a), b) in base.indexed_iter().zip(out.iter()) {
            if idx.1 < 5 {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn forecast_ignores_unobserved_history() {
        let dec = decoder();
        let ctx = context();
        let split = 3;
        let base = dec.forward(&ctx, DecodeMode::Forecast { split }, None).unwrap();
        assert_eq!(base.dim(), (2, 3, 3));

        // Changing non-future columns after the split must not matter.
        let mut changed = ctx.clone();
        changed.slice_mut(s![.., split.., 0]).fill(-4.0);
        changed.slice_mut(s![.., split.., 2]).fill(4.0);
        let out = dec.forward(&changed, DecodeMode::Forecast { split }, None).unwrap();
        for (a, b) in base.iter().zip(out.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        // Changing a future-knowable column does.
        let mut changed = ctx;
        changed.slice_mut(s![.., split.., 1]).fill(4.0);
        let out = dec.forward(&changed, DecodeMode::Forecast { split }, None).unwrap();
        assert!(base.iter().zip(out.iter()).any(|(a, b)| (a - b).abs() > 1e-9));
    }

    #[test]
    fn heads_must_divide_width() {
        let layout = TransformerLayout {
            context_width: 6,
            source_heads: 4,
            layers: 1,
            ff_width: 8,
            output_width: 3,
            dropout: 0.0,
        };
        let err = TransformerDecoder::new(&layout, vec![0], &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert_eq!(err.code(), 70);
    }

    #[test]
    fn requires_future_marks() {
        let layout = TransformerLayout {
            context_width: 4,
            source_heads: 2,
            layers: 1,
            ff_width: 8,
            output_width: 3,
            dropout: 0.0,
        };
        assert!(TransformerDecoder::new(&layout, vec![], &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn restore_rejects_tampered_inner_layer() {
        let mut json = serde_json::to_value(decoder().snapshot()).unwrap();
        json["source_layers"][0]["self_attn"]["head_dim"] = serde_json::json!(1);
        let weights: DecoderWeights = serde_json::from_value(json).unwrap();
        let err = weights.into_decoder().unwrap_err();
        assert_eq!(err.code(), 70);

        let mut json = serde_json::to_value(decoder().snapshot()).unwrap();
        json["target_layers"][1]["norm2"]["gamma"]["dim"] = serde_json::json!([1]);
        json["target_layers"][1]["norm2"]["gamma"]["data"] = serde_json::json!([1.0]);
        let weights: DecoderWeights = serde_json::from_value(json).unwrap();
        assert!(weights.into_decoder().is_err());
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let dec = decoder();
        let json = serde_json::to_string(&dec.snapshot()).unwrap();
        let restored: DecoderWeights = serde_json::from_str(&json).unwrap();
        let restored = restored.into_decoder().unwrap();
        let ctx = context();
        let a = dec.forward(&ctx, DecodeMode::Fit, None).unwrap();
        let b = restored.forward(&ctx, DecodeMode::Fit, None).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }
}
