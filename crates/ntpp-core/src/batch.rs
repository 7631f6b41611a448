//! Event sequences and padded batches.
//!
//! A [`Sequence`] is one catalog window: positive inter-event times plus the
//! per-event covariates. A [`Batch`] stacks sequences into `(batch, steps)`
//! arrays with a validity mask. Ingestion and padding policy belong to the
//! caller; [`Batch::from_sequences`] is the minimal right-padding constructor
//! the engine's evaluation helpers and tests rely on.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One event sequence with its covariates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Time between consecutive events; strictly positive.
    pub inter_times: Vec<f64>,
    pub magnitudes: Vec<f64>,
    /// Fluid injection rate at each event.
    pub injection_rate: Vec<f64>,
    /// Injected volume change since the previous event.
    pub volume_change: Vec<f64>,
    /// Sign of the injection rate trend.
    pub injection_sign: Vec<f64>,
    /// Time since the last injection sign change.
    pub time_since_sign_change: Vec<f64>,
    /// Smoothed causal seismicity rate.
    pub seismicity_rate: Vec<f64>,
    pub supplementary: BTreeMap<String, Vec<f64>>,
    /// Magnitude of completeness of the catalog window.
    pub mag_completeness: f64,
    /// Absolute time the window starts at.
    pub t_start: f64,
    /// End of the observation window; an interval after the last event is censored.
    pub t_end: Option<f64>,
}

impl Sequence {
    /// Sequence with the given inter-event times and all covariates zero.
    pub fn new(inter_times: Vec<f64>) -> Self {
        let n = inter_times.len();
        Self {
            inter_times,
            magnitudes: vec![0.0; n],
            injection_rate: vec![0.0; n],
            volume_change: vec![0.0; n],
            injection_sign: vec![0.0; n],
            time_since_sign_change: vec![0.0; n],
            seismicity_rate: vec![0.0; n],
            supplementary: BTreeMap::new(),
            mag_completeness: 0.0,
            t_start: 0.0,
            t_end: None,
        }
    }

    pub fn with_magnitudes(mut self, magnitudes: Vec<f64>, completeness: f64) -> Self {
        self.magnitudes = magnitudes;
        self.mag_completeness = completeness;
        self
    }

    /// Set the four injection covariates: rate, volume change, sign and
    /// time since the last sign change.
    pub fn with_injection(
        mut self,
        rate: Vec<f64>,
        volume_change: Vec<f64>,
        sign: Vec<f64>,
        time_since_sign_change: Vec<f64>,
    ) -> Self {
        self.injection_rate = rate;
        self.volume_change = volume_change;
        self.injection_sign = sign;
        self.time_since_sign_change = time_since_sign_change;
        self
    }

    pub fn with_seismicity_rate(mut self, rate: Vec<f64>) -> Self {
        self.seismicity_rate = rate;
        self
    }

    pub fn with_supplementary(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.supplementary.insert(name.into(), values);
        self
    }

    pub fn with_window(mut self, t_start: f64, t_end: Option<f64>) -> Self {
        self.t_start = t_start;
        self.t_end = t_end;
        self
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.inter_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inter_times.is_empty()
    }

    /// Absolute event times: `t_start` plus the cumulative inter-event times.
    pub fn arrival_times(&self) -> Vec<f64> {
        self.inter_times
            .iter()
            .scan(self.t_start, |t, dt| {
                *t += dt;
                Some(*t)
            })
            .collect()
    }

    /// Check the sequence invariants.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        if n == 0 {
            return Err(ModelError::InvalidBatch(
                "sequence must contain at least one event".to_string(),
            ));
        }
        if let Some(bad) = self
            .inter_times
            .iter()
            .find(|dt| !(dt.is_finite() && **dt > 0.0))
        {
            return Err(ModelError::InvalidBatch(format!(
                "inter-event times must be positive and finite, got {bad}"
            )));
        }

        let fields: [(&str, &Vec<f64>); 6] = [
            ("magnitudes", &self.magnitudes),
            ("injection_rate", &self.injection_rate),
            ("volume_change", &self.volume_change),
            ("injection_sign", &self.injection_sign),
            ("time_since_sign_change", &self.time_since_sign_change),
            ("seismicity_rate", &self.seismicity_rate),
        ];
        for (name, values) in fields
            .into_iter()
            .chain(self.supplementary.iter().map(|(k, v)| (k.as_str(), v)))
        {
            if values.len() != n {
                return Err(ModelError::InvalidBatch(format!(
                    "field '{name}' has {} values for {n} events",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

/// Right-padded batch of sequences, every field shaped `(batch, steps)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inter_times: Array2<f64>,
    pub magnitudes: Array2<f64>,
    pub injection_rate: Array2<f64>,
    pub volume_change: Array2<f64>,
    pub injection_sign: Array2<f64>,
    pub time_since_sign_change: Array2<f64>,
    pub seismicity_rate: Array2<f64>,
    pub supplementary: BTreeMap<String, Array2<f64>>,
    /// One completeness magnitude per sequence.
    pub mag_completeness: Array1<f64>,
    /// `true` where a step holds a real event.
    pub mask: Array2<bool>,
    /// Valid length of each sequence.
    pub end_idx: Vec<usize>,
}

impl Batch {
    /// Stack sequences, padding shorter ones with zeros and a false mask.
    pub fn from_sequences(sequences: &[Sequence]) -> Result<Self> {
        if sequences.is_empty() {
            return Err(ModelError::InvalidBatch("batch has no sequences".to_string()));
        }
        for seq in sequences {
            seq.validate()?;
        }

        let names: Vec<&String> = sequences[0].supplementary.keys().collect();
        if sequences
            .iter()
            .any(|s| !s.supplementary.keys().eq(names.iter().copied()))
        {
            return Err(ModelError::InvalidBatch(
                "sequences disagree on supplementary mark names".to_string(),
            ));
        }

        let b = sequences.len();
        let steps = sequences.iter().map(Sequence::len).max().unwrap_or(0);
        let stack = |field: fn(&Sequence) -> &Vec<f64>| {
            let mut out = Array2::zeros((b, steps));
            for (i, seq) in sequences.iter().enumerate() {
                for (t, v) in field(seq).iter().enumerate() {
                    out[[i, t]] = *v;
                }
            }
            out
        };

        let mut supplementary = BTreeMap::new();
        for name in names {
            let mut out = Array2::zeros((b, steps));
            for (i, seq) in sequences.iter().enumerate() {
                if let Some(values) = seq.supplementary.get(name) {
                    for (t, v) in values.iter().enumerate() {
                        out[[i, t]] = *v;
                    }
                }
            }
            supplementary.insert(name.clone(), out);
        }

        let end_idx: Vec<usize> = sequences.iter().map(Sequence::len).collect();
        let mask = Array2::from_shape_fn((b, steps), |(i, t)| t < end_idx[i]);

        let batch = Self {
            inter_times: stack(|s| &s.inter_times),
            magnitudes: stack(|s| &s.magnitudes),
            injection_rate: stack(|s| &s.injection_rate),
            volume_change: stack(|s| &s.volume_change),
            injection_sign: stack(|s| &s.injection_sign),
            time_since_sign_change: stack(|s| &s.time_since_sign_change),
            seismicity_rate: stack(|s| &s.seismicity_rate),
            supplementary,
            mag_completeness: sequences.iter().map(|s| s.mag_completeness).collect(),
            mask,
            end_idx,
        };
        batch.validate()?;
        Ok(batch)
    }

    pub fn batch_size(&self) -> usize {
        self.inter_times.nrows()
    }

    /// Padded step count L.
    pub fn steps(&self) -> usize {
        self.inter_times.ncols()
    }

    /// Check shapes and the mask/end_idx agreement.
    pub fn validate(&self) -> Result<()> {
        let shape = self.inter_times.dim();
        let fields = [
            ("magnitudes", &self.magnitudes),
            ("injection_rate", &self.injection_rate),
            ("volume_change", &self.volume_change),
            ("injection_sign", &self.injection_sign),
            ("time_since_sign_change", &self.time_since_sign_change),
            ("seismicity_rate", &self.seismicity_rate),
        ];
        for (name, values) in fields
            .into_iter()
            .chain(self.supplementary.iter().map(|(k, v)| (k.as_str(), v)))
        {
            if values.dim() != shape {
                return Err(ModelError::InvalidBatch(format!(
                    "field '{name}' has shape {:?}, expected {:?}",
                    values.dim(),
                    shape
                )));
            }
        }
        if self.mask.dim() != shape {
            return Err(ModelError::InvalidBatch(format!(
                "mask has shape {:?}, expected {:?}",
                self.mask.dim(),
                shape
            )));
        }
        if self.end_idx.len() != shape.0 || self.mag_completeness.len() != shape.0 {
            return Err(ModelError::InvalidBatch(
                "end_idx and mag_completeness need one entry per sequence".to_string(),
            ));
        }
        for (b, &end) in self.end_idx.iter().enumerate() {
            if end > shape.1 {
                return Err(ModelError::InvalidBatch(format!(
                    "end_idx[{b}] = {end} exceeds step count {}",
                    shape.1
                )));
            }
            if self.mask.row(b).iter().skip(end).any(|&m| m) {
                return Err(ModelError::InvalidBatch(format!(
                    "mask is set beyond end_idx[{b}] = {end}"
                )));
            }
        }
        Ok(())
    }
}
