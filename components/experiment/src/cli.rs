//! Command-line interface

use crate::config::{ExperimentConfig, ProfileSource, DEFAULT_ITERATIONS, DEFAULT_RUNS, DEFAULT_WARMUP};
use clap::Parser;
use shadow_price::{Condition, DEFAULT_SEED};
use std::path::PathBuf;

/// Compare inlining policies on a fixed benchmark
#[derive(Debug, Clone, Parser)]
#[command(name = "shadow-bench", version, about)]
pub struct Cli {
    /// Trials per condition
    #[arg(long, default_value_t = DEFAULT_RUNS)]
    pub runs: usize,

    /// Loop count of the timed driver call
    #[arg(long, short = 'n', default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: i64,

    /// Loop count of the untimed warmup call
    #[arg(long, default_value_t = DEFAULT_WARMUP)]
    pub warmup: i64,

    /// Seed for the Random condition
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u32,

    /// Condition to run: none, all, random, shadow, inverted (repeatable; default all five)
    #[arg(long = "condition", short = 'c', value_name = "NAME")]
    pub conditions: Vec<Condition>,

    /// Where call counts come from
    #[arg(long, value_enum, default_value_t = ProfileSource::Synthetic)]
    pub profile: ProfileSource,

    /// Limit the profile store to N callee names (256 when N is omitted); later names are priced cold
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "256")]
    pub profile_capacity: Option<usize>,

    /// Write every decision of each condition's first run to this CSV file
    #[arg(long, value_name = "PATH")]
    pub decision_log: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Experiment settings described by the arguments
    pub fn to_config(&self) -> ExperimentConfig {
        let conditions = if self.conditions.is_empty() {
            Condition::ALL.to_vec()
        } else {
            self.conditions.clone()
        };
        ExperimentConfig {
            runs: self.runs,
            iterations: self.iterations,
            warmup: self.warmup,
            seed: self.seed,
            conditions,
            profile_source: self.profile,
            profile_capacity: self.profile_capacity,
            decision_log: self.decision_log.clone(),
        }
    }

    /// Default log filter for the verbosity level
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
