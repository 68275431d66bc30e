//! Shadow-price inlining experiment harness
//!
//! This crate provides:
//!
//! - A fixed benchmark module with hot, warm and cold callees
//! - A trial runner that mutates, links, compiles and times the benchmark
//! - Summary statistics and the falsifiable predictions report
//! - The `shadow-bench` command-line tool
//!
//! # Examples
//!
//! ```rust,no_run
//! use experiment::{Experiment, ExperimentConfig};
//!
//! let config = ExperimentConfig {
//!     runs: 3,
//!     iterations: 1_000_000,
//!     ..ExperimentConfig::default()
//! };
//! let experiment = Experiment::new(config).unwrap();
//! let results = experiment.run(|_, _| {}).unwrap();
//! for result in &results {
//!     println!("{}: {:.4}s", result.label, result.summary.mean);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod benchmark;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod stats;
pub mod trial;

pub use cli::Cli;
pub use config::{ExperimentConfig, ProfileSource};
pub use error::{ExperimentError, ExperimentResult};
pub use report::ExperimentReport;
pub use trial::{ConditionResult, TrialRunner};

use shadow_price::{CsvSink, DecisionSink, NullSink, ProfileStore};
use tracing::info;

/// A configured experiment with its profile
pub struct Experiment {
    config: ExperimentConfig,
    profile: ProfileStore,
}

impl Experiment {
    /// Validate the configuration and build the profile
    pub fn new(config: ExperimentConfig) -> ExperimentResult<Self> {
        config.validate()?;
        let profile = trial::build_profile(config.profile_source, config.profile_capacity)?;
        info!(
            source = ?config.profile_source,
            callees = profile.len(),
            "profile ready"
        );
        Ok(Self { config, profile })
    }

    /// Settings
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Profile every condition decides from
    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    /// Run every configured condition in order
    ///
    /// `progress` is called with the position and result of each condition
    /// as it completes. When a decision log is configured, the first run of
    /// every condition is written to it.
    pub fn run(&self, mut progress: impl FnMut(usize, &ConditionResult)) -> ExperimentResult<Vec<ConditionResult>> {
        let runner = TrialRunner::new(&self.config, &self.profile);
        let mut log = match &self.config.decision_log {
            Some(path) => Some(CsvSink::create(path)?),
            None => None,
        };

        let mut null = NullSink;
        let mut results = Vec::with_capacity(self.config.conditions.len());
        for (i, &condition) in self.config.conditions.iter().enumerate() {
            let sink: &mut dyn DecisionSink = match log.as_mut() {
                Some(log) => log,
                None => &mut null,
            };
            let result = runner.run_condition(condition, sink)?;
            progress(i, &result);
            results.push(result);
        }

        if let Some(log) = log {
            log.finish()?;
        }
        Ok(results)
    }

    /// Assemble the report for finished results
    pub fn report(&self, results: Vec<ConditionResult>) -> ExperimentReport {
        ExperimentReport::new(&self.config, &self.profile, results)
    }
}
