use crate::error::{check_param, ConfigError};
use crate::random::{TrafficModel, VariableKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_FLOW_RATE: f64 = 1.0;

/// Per-experiment parameters shared by every client and server of one run.
///
/// Holds the run number, the calibrated traffic model and the single random
/// stream all parties draw from. Same run number, same stream.
#[derive(Debug)]
pub struct RuntimeVariable {
    run_no: u64,
    model: TrafficModel,
    rng: Mutex<StdRng>,
}

impl RuntimeVariable {
    pub fn new(run_no: u64) -> Result<Self, ConfigError> {
        Self::with_rate(run_no, DEFAULT_FLOW_RATE)
    }

    /// `rate` is the flow arrival rate (sessions per second) the model is scaled to.
    pub fn with_rate(run_no: u64, rate: f64) -> Result<Self, ConfigError> {
        check_param("flow_rate", rate.is_finite() && rate > 0.0, || {
            format!("rate {rate} must be positive")
        })?;
        Ok(Self::with_model(run_no, TrafficModel::calibrated(rate)?))
    }

    pub fn with_model(run_no: u64, model: TrafficModel) -> Self {
        Self {
            run_no,
            model,
            rng: Mutex::new(StdRng::seed_from_u64(run_no)),
        }
    }

    pub fn run_no(&self) -> u64 {
        self.run_no
    }

    pub fn rate(&self) -> f64 {
        self.model.flow_arrive.rate()
    }

    pub fn model(&self) -> &TrafficModel {
        &self.model
    }

    pub fn sample(&self, kind: VariableKind) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.model.variable(kind).sample(&mut rng)
    }

    /// Draw a count (pages, objects) and round it, never below one.
    pub fn sample_count(&self, kind: VariableKind) -> u32 {
        (self.sample(kind).round() as u32).max(1)
    }

    pub fn sample_bytes(&self, kind: VariableKind) -> u32 {
        self.sample(kind).round().min(u32::MAX as f64) as u32
    }

    pub fn sample_us(&self, kind: VariableKind) -> u64 {
        crate::secs_to_us(self.sample(kind))
    }

    pub fn sample_flag(&self, kind: VariableKind) -> bool {
        self.sample(kind) >= 0.5
    }

    pub fn average(&self, kind: VariableKind) -> f64 {
        self.model.variable(kind).average()
    }
}
