//! Experiment configuration

use crate::error::{ExperimentError, ExperimentResult};
use serde::Serialize;
use shadow_price::{Condition, DEFAULT_SEED};
use std::path::PathBuf;

/// Independent trials per condition
pub const DEFAULT_RUNS: usize = 20;

/// Iterations of the untimed warmup call
pub const DEFAULT_WARMUP: i64 = 1_000;

/// Iterations of the timed call
pub const DEFAULT_ITERATIONS: i64 = 100_000_000;

/// Where call counts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    /// Observation counts fixed by the benchmark's known call frequencies
    #[default]
    Synthetic,
    /// One observation per call site found in the benchmark IR
    Static,
}

/// Settings for one experiment
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentConfig {
    /// Trials per condition
    pub runs: usize,
    /// Loop count passed to the timed driver call
    pub iterations: i64,
    /// Loop count passed to the warmup driver call
    pub warmup: i64,
    /// Seed for the Random condition, reset before every trial
    pub seed: u32,
    /// Conditions to run, in order
    #[serde(serialize_with = "serialize_conditions")]
    pub conditions: Vec<Condition>,
    /// How the profile is populated
    pub profile_source: ProfileSource,
    /// Name limit of the profile store; `None` keeps every callee
    pub profile_capacity: Option<usize>,
    /// Where to write the per-call-site decision log
    #[serde(skip)]
    pub decision_log: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            iterations: DEFAULT_ITERATIONS,
            warmup: DEFAULT_WARMUP,
            seed: DEFAULT_SEED,
            conditions: Condition::ALL.to_vec(),
            profile_source: ProfileSource::default(),
            profile_capacity: None,
            decision_log: None,
        }
    }
}

impl ExperimentConfig {
    /// Reject settings that cannot produce a result
    pub fn validate(&self) -> ExperimentResult<()> {
        if self.runs == 0 {
            return Err(ExperimentError::Config("runs must be at least 1".to_string()));
        }
        if self.iterations < 0 || self.warmup < 0 {
            return Err(ExperimentError::Config(
                "iterations and warmup must not be negative".to_string(),
            ));
        }
        if self.conditions.is_empty() {
            return Err(ExperimentError::Config("no conditions selected".to_string()));
        }
        for (i, c) in self.conditions.iter().enumerate() {
            if self.conditions[..i].contains(c) {
                return Err(ExperimentError::Config(format!("condition `{}` given twice", c.slug())));
            }
        }
        Ok(())
    }
}

fn serialize_conditions<S: serde::Serializer>(conditions: &[Condition], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(conditions.iter().map(|c| c.slug()))
}
