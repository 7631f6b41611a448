//! The assembled model.
//!
//! [`Oracle`] chains mark assembly, the optional history encoder, the decoder
//! and the output head, and exposes the fit/forecast loss together with the
//! evaluation helpers used for intensity, compensator and likelihood curves.
//!
//! Parameters are only read during a forward evaluation. Dropout is active
//! only in [`Oracle::training_loss`]; every other entry point evaluates.

use ndarray::{Array1, Array3};
use ntpp_config::{validate_model_config, HeadKind, ModelConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::batch::{Batch, Sequence};
use crate::context::{Context, ContextBuilder};
use crate::decoder::{build_decoder, DecodeMode, Decoder, DecoderWeights};
use crate::distribution::{InterTimeDistribution, InterTimeEstimate};
use crate::encoder::{HistoryEncoder, RecurrentCell, RecurrentState};
use crate::error::{ensure_width, ModelError, Result};
use crate::forecast::ForecastController;
use crate::logging::event_names;
use crate::loss::{masked_l1_residual, normalize_by_events};
use crate::marks::MarkAssembler;
use crate::nn::Noise;

/// Everything needed to rebuild an [`Oracle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub config: ModelConfig,
    pub context: ContextBuilder,
    pub decoder: DecoderWeights,
}

impl ModelWeights {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ModelError::InvalidRequest(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::InvalidRequest(e.to_string()))
    }
}

/// Values on an absolute time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub grid: Vec<f64>,
    pub values: Vec<f64>,
}

/// Stitched predictions for one sequence split at a forecast time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCurve {
    /// First step treated as unobserved.
    pub split: usize,
    pub arrival_times: Vec<f64>,
    /// Expected inter-event time per step; fit mode before `split`, forecast mode after.
    pub predicted_inter_times: Vec<f64>,
}

#[derive(Debug)]
pub struct Oracle {
    config: ModelConfig,
    marks: MarkAssembler,
    context: ContextBuilder,
    decoder: Box<dyn Decoder>,
}

impl Oracle {
    /// Validate the config and build a model with seeded initial weights.
    pub fn new(config: ModelConfig) -> Result<Self> {
        validate_model_config(&config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let marks = MarkAssembler::new(&config);
        let context = Self::build_context(&config, &mut rng);
        let decoder = build_decoder(&config, marks.future_indices(), &mut rng)?;
        let oracle = Self::assemble(config, marks, context, decoder)?;
        info!(
            event = event_names::MODEL_CONSTRUCTED,
            encoder = %oracle.config.encoder,
            decoder = %oracle.config.decoder,
            head = %oracle.config.head,
            mark_width = oracle.mark_width(),
            context_width = oracle.context_width(),
            "model constructed"
        );
        Ok(oracle)
    }

    /// Build around a caller-supplied decoder.
    ///
    /// Fails if the decoder's input or output width disagrees with the config.
    pub fn with_decoder(config: ModelConfig, decoder: Box<dyn Decoder>) -> Result<Self> {
        validate_model_config(&config)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let marks = MarkAssembler::new(&config);
        let context = Self::build_context(&config, &mut rng);
        Self::assemble(config, marks, context, decoder)
    }

    /// Rebuild from persisted weights, re-running every shape check.
    pub fn from_weights(weights: ModelWeights) -> Result<Self> {
        validate_model_config(&weights.config)?;
        let marks = MarkAssembler::new(&weights.config);
        match (weights.context.encoder(), weights.config.encoder.is_enabled()) {
            (Some(encoder), true) => {
                ensure_width("encoder width", marks.width(), encoder.width())?;
                encoder.check(marks.width())?;
                if RecurrentCell::from_kind(weights.config.encoder) != Some(encoder.cell()) {
                    return Err(ModelError::InvalidRequest(format!(
                        "stored {:?} encoder does not match configured kind '{}'",
                        encoder.cell(),
                        weights.config.encoder
                    )));
                }
            }
            (None, false) => {}
            _ => {
                return Err(ModelError::InvalidRequest(
                    "stored encoder presence does not match the config".to_string(),
                ))
            }
        }
        let decoder = weights.decoder.into_decoder()?;
        let oracle = Self::assemble(weights.config, marks, weights.context, decoder)?;
        info!(
            event = event_names::MODEL_RESTORED,
            decoder = %oracle.config.decoder,
            "model restored from weights"
        );
        Ok(oracle)
    }

    pub fn to_weights(&self) -> ModelWeights {
        ModelWeights {
            config: self.config.clone(),
            context: self.context.clone(),
            decoder: self.decoder.snapshot(),
        }
    }

    fn build_context(config: &ModelConfig, rng: &mut StdRng) -> ContextBuilder {
        let encoder = RecurrentCell::from_kind(config.encoder)
            .map(|cell| HistoryEncoder::new(cell, config.num_marks(), config.dropout_prob, rng));
        ContextBuilder::new(encoder)
    }

    fn assemble(
        config: ModelConfig,
        marks: MarkAssembler,
        context: ContextBuilder,
        decoder: Box<dyn Decoder>,
    ) -> Result<Self> {
        if decoder.kind() != config.decoder {
            return Err(ModelError::InvalidRequest(format!(
                "decoder is '{}' but the config asks for '{}'",
                decoder.kind(),
                config.decoder
            )));
        }
        ensure_width("decoder input", context.width(marks.width()), decoder.input_width())?;
        ensure_width("decoder output", config.raw_output_width(), decoder.output_width())?;
        Ok(Self {
            config,
            marks,
            context,
            decoder,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    /// Mark width Dm.
    pub fn mark_width(&self) -> usize {
        self.marks.width()
    }

    /// Context width Dc.
    pub fn context_width(&self) -> usize {
        self.context.width(self.marks.width())
    }

    /// `(batch, steps, Dm)` marks for a batch.
    pub fn get_marks(&self, batch: &Batch) -> Result<Array3<f64>> {
        batch.validate()?;
        self.marks.assemble(batch)
    }

    /// Context for the given marks, optionally resuming from a recurrent state.
    pub fn get_context(&self, marks: &Array3<f64>, state: Option<RecurrentState>) -> Result<Context> {
        self.context.build(marks, state, None)
    }

    /// Distribution (mixture head) or point estimate (point head) per step.
    pub fn get_distribution_or_point_estimate(
        &self,
        marks: &Array3<f64>,
        forecasting: bool,
        split_index: usize,
    ) -> Result<InterTimeEstimate> {
        let context = self.context.build(marks, None, None)?;
        self.estimate(&context.tensor, DecodeMode::new(forecasting, split_index), None)
    }

    fn estimate(&self, context: &Array3<f64>, mode: DecodeMode, noise: Noise<'_>) -> Result<InterTimeEstimate> {
        let raw = self.decoder.forward(context, mode, noise)?;
        InterTimeEstimate::from_raw(self.config.head, &raw)
    }

    /// Per-sequence loss with dropout disabled.
    ///
    /// `rng` only draws forecast splits when `forecast_count > 0`.
    pub fn loss(
        &self,
        batch: &Batch,
        forecasting: bool,
        forecast_count: usize,
        rng: &mut StdRng,
    ) -> Result<Array1<f64>> {
        self.compute_loss(batch, forecasting, forecast_count, rng, false)
    }

    /// Per-sequence loss with dropout driven by `rng`.
    pub fn training_loss(
        &self,
        batch: &Batch,
        forecasting: bool,
        forecast_count: usize,
        rng: &mut StdRng,
    ) -> Result<Array1<f64>> {
        self.compute_loss(batch, forecasting, forecast_count, rng, true)
    }

    fn compute_loss(
        &self,
        batch: &Batch,
        forecasting: bool,
        forecast_count: usize,
        rng: &mut StdRng,
        training: bool,
    ) -> Result<Array1<f64>> {
        let marks = self.get_marks(batch)?;
        let steps = batch.steps();
        let plan = if forecasting {
            let plan = ForecastController::plan(steps, forecast_count, rng)?;
            trace!(
                event = event_names::FORECAST_PLANNED,
                splits = ?plan.splits(),
                divisor = plan.divisor(),
                "forecast splits planned"
            );
            Some(plan)
        } else {
            None
        };

        let mut noise = training.then_some(rng);
        let context = self.context.build(&marks, None, noise.as_deref_mut())?;
        let fit = self
            .estimate(&context.tensor, DecodeMode::Fit, noise.as_deref_mut())?
            .expected_inter_times();
        let fit_residual = masked_l1_residual(&fit, batch)?;

        let total = match &plan {
            None => fit_residual.per_sequence.clone(),
            Some(plan) => {
                let forecast = plan.forecast_residual(&fit, batch, |split| {
                    Ok(self
                        .estimate(
                            &context.tensor,
                            DecodeMode::Forecast { split },
                            noise.as_deref_mut(),
                        )?
                        .expected_inter_times())
                })?;
                (&fit_residual.per_sequence + &forecast) / plan.divisor()
            }
        };
        let loss = normalize_by_events(total, &batch.end_idx);

        debug!(
            event = event_names::LOSS_COMPUTED,
            batch_size = batch.batch_size(),
            steps,
            forecasting,
            splits = plan.as_ref().map_or(0, |p| p.splits().len()),
            active_steps = fit_residual.active_counts.iter().sum::<usize>(),
            mean_loss = loss.mean().unwrap_or(f64::NAN),
            training,
            "loss computed"
        );
        Ok(loss)
    }

    /// Fit-mode mixture for a single sequence; `None` for the point head.
    fn sequence_distribution(&self, sequence: &Sequence) -> Result<Option<InterTimeDistribution>> {
        if self.config.head == HeadKind::Point {
            return Ok(None);
        }
        let batch = Batch::from_sequences(std::slice::from_ref(sequence))?;
        let marks = self.get_marks(&batch)?;
        match self.get_distribution_or_point_estimate(&marks, false, 0)? {
            InterTimeEstimate::Distribution(dist) => Ok(Some(dist)),
            InterTimeEstimate::Point(_) => Ok(None),
        }
    }

    /// Conditional intensity over each inter-event interval.
    ///
    /// Each interval after the first event is evaluated at `num_grid_points`
    /// evenly spaced points ending at the next event (`0` evaluates at the event
    /// times only). A censored tail up to `t_end` is included when set.
    /// `None` for the point head, which has no intensity.
    pub fn evaluate_intensity(&self, sequence: &Sequence, num_grid_points: usize) -> Result<Option<Curve>> {
        let Some(dist) = self.sequence_distribution(sequence)? else {
            return Ok(None);
        };
        let mut curve = Curve {
            grid: Vec::new(),
            values: Vec::new(),
        };
        for_each_interval(sequence, &dist, num_grid_points, |mixture, start, u, _| {
            curve.grid.push(start + u);
            curve.values.push(mixture.log_hazard(u).exp());
        });
        Ok(Some(curve))
    }

    /// Expected event count since the first event, on the same grid as
    /// [`Oracle::evaluate_intensity`]. `None` for the point head.
    pub fn evaluate_compensator(&self, sequence: &Sequence, num_grid_points: usize) -> Result<Option<Curve>> {
        let Some(dist) = self.sequence_distribution(sequence)? else {
            return Ok(None);
        };
        let mut curve = Curve {
            grid: Vec::new(),
            values: Vec::new(),
        };
        for_each_interval(sequence, &dist, num_grid_points, |mixture, start, u, offset| {
            curve.grid.push(start + u);
            curve.values.push(offset + mixture.compensator(u));
        });
        Ok(Some(curve))
    }

    /// Negative log-likelihood of each observed interval after the first event,
    /// plus the censored tail when `t_end` is past the last event.
    /// `None` for the point head.
    pub fn evaluate_nll(&self, sequence: &Sequence) -> Result<Option<Vec<f64>>> {
        let Some(dist) = self.sequence_distribution(sequence)? else {
            return Ok(None);
        };
        let n = sequence.len();
        let mut nll = Vec::with_capacity(n);
        for s in 1..n {
            if let Some(mixture) = dist.get(0, s - 1) {
                nll.push(-mixture.log_density(sequence.inter_times[s]));
            }
        }
        if let (Some(tail), Some(mixture)) = (censored_tail(sequence), dist.get(0, n - 1)) {
            nll.push(-mixture.log_survival(tail));
        }
        debug!(
            event = event_names::EVALUATION_COMPLETED,
            kind = "nll",
            terms = nll.len(),
            "evaluation completed"
        );
        Ok(Some(nll))
    }

    /// Split one sequence at the first event after `t_forecast` and return the
    /// stitched expected inter-event times.
    pub fn forecast_curve(&self, sequence: &Sequence, t_forecast: f64) -> Result<ForecastCurve> {
        let arrival_times = sequence.arrival_times();
        let split = arrival_times
            .iter()
            .position(|&t| t > t_forecast)
            .unwrap_or(arrival_times.len());
        if split == 0 || split >= arrival_times.len() {
            return Err(ModelError::InvalidRequest(format!(
                "forecast time {t_forecast} leaves no observed prefix or no forecast steps"
            )));
        }

        let batch = Batch::from_sequences(std::slice::from_ref(sequence))?;
        let marks = self.get_marks(&batch)?;
        let context = self.context.build(&marks, None, None)?;
        let fit = self
            .estimate(&context.tensor, DecodeMode::Fit, None)?
            .expected_inter_times();
        let forecast = self
            .estimate(&context.tensor, DecodeMode::Forecast { split }, None)?
            .expected_inter_times();
        let stitched = ForecastController::stitch(&fit, &forecast, split)?;

        Ok(ForecastCurve {
            split,
            arrival_times,
            predicted_inter_times: stitched.row(0).to_vec(),
        })
    }
}

fn censored_tail(sequence: &Sequence) -> Option<f64> {
    let last = sequence.arrival_times().last().copied()?;
    sequence
        .t_end
        .map(|end| end - last)
        .filter(|tail| *tail > 0.0)
}

/// Walk every interval that has a predicting distribution.
///
/// Calls `f(mixture, interval_start, elapsed, compensator_offset)` per grid
/// point, where the offset is the accumulated compensator of earlier intervals.
fn for_each_interval<F>(sequence: &Sequence, dist: &InterTimeDistribution, num_grid_points: usize, mut f: F)
where
    F: FnMut(&ntpp_math::WeibullMixture, f64, f64, f64),
{
    let arrivals = sequence.arrival_times();
    let points = num_grid_points.max(1);

    let mut intervals: Vec<(usize, f64, f64)> = (1..sequence.len())
        .map(|s| (s - 1, arrivals[s - 1], sequence.inter_times[s]))
        .collect();
    if let (Some(tail), Some(&last)) = (censored_tail(sequence), arrivals.last()) {
        intervals.push((sequence.len() - 1, last, tail));
    }

    let mut offset = 0.0;
    for (step, start, length) in intervals {
        let Some(mixture) = dist.get(0, step) else {
            continue;
        };
        for j in 1..=points {
            let u = length * j as f64 / points as f64;
            f(mixture, start, u, offset);
        }
        offset += mixture.compensator(length);
    }
}
