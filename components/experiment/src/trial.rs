//! Trial runner
//!
//! A trial builds a fresh compilation context from the benchmark source,
//! runs the decision pass for one condition, links, compiles, warms up and
//! times one driver call. The context and its generated code are dropped
//! before the next trial starts.

use crate::benchmark::{self, ENTRY};
use crate::config::{ExperimentConfig, ProfileSource};
use crate::error::{ExperimentError, ExperimentResult};
use crate::stats::Summary;
use jit_compiler::{parse_module, CompilationContext, LinkStats};
use serde::Serialize;
use shadow_price::{profile_unit, Condition, DecisionPass, DecisionSink, NullSink, ProfileStore};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a single trial
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Call sites promoted by the decision pass
    pub promotions: usize,
    /// What the linker did with them
    pub link: LinkStats,
    /// Wall-clock seconds of the timed call
    pub elapsed: f64,
    /// Value returned by the timed call
    pub result: i64,
}

/// All trials of one condition
#[derive(Debug, Clone, Serialize)]
pub struct ConditionResult {
    /// Condition run
    #[serde(skip)]
    pub condition: Condition,
    /// Condition slug
    pub name: &'static str,
    /// Condition label
    pub label: &'static str,
    /// Promotions in the first run
    pub promotions: usize,
    /// Calls the linker inlined in the first run
    pub inlined: usize,
    /// Of those, how many were promoted candidates
    pub inlined_candidates: usize,
    /// Timed seconds per run
    pub times: Vec<f64>,
    /// Mean and spread of `times`
    pub summary: Summary,
    /// Driver result of the first run
    pub result: i64,
    /// Whether every run returned the same driver result
    pub stable: bool,
}

/// Runs trials against one profile
pub struct TrialRunner<'a> {
    config: &'a ExperimentConfig,
    profile: &'a ProfileStore,
    source: String,
}

impl<'a> TrialRunner<'a> {
    /// Create a runner for the benchmark module
    pub fn new(config: &'a ExperimentConfig, profile: &'a ProfileStore) -> Self {
        Self {
            config,
            profile,
            source: benchmark::source(),
        }
    }

    /// Run one trial, reporting each decision to `sink`
    pub fn run_trial(&self, condition: Condition, sink: &mut dyn DecisionSink) -> ExperimentResult<TrialOutcome> {
        let mut ctx = CompilationContext::from_source(&self.source)?;

        let pass = DecisionPass::new(condition).run(ctx.module_mut(), self.profile, self.config.seed, sink);
        let link = ctx.link();
        debug!(
            condition = condition.slug(),
            promotions = pass.promotions,
            inlined = link.inlined,
            declined_budget = link.declined_budget,
            "trial linked"
        );

        let compiled = ctx.compile()?;
        let driver = compiled.entry(ENTRY)?;

        driver.invoke(&[self.config.warmup])?;

        let start = Instant::now();
        let result = driver.invoke(&[self.config.iterations])?;
        let elapsed = start.elapsed().as_secs_f64();

        Ok(TrialOutcome {
            promotions: pass.promotions,
            link,
            elapsed,
            result,
        })
    }

    /// Run every trial of one condition
    ///
    /// Only the first run reports its decisions to `sink`; later runs make
    /// identical decisions.
    pub fn run_condition(&self, condition: Condition, sink: &mut dyn DecisionSink) -> ExperimentResult<ConditionResult> {
        let mut times = Vec::with_capacity(self.config.runs);
        let mut first: Option<TrialOutcome> = None;
        let mut stable = true;

        for run in 0..self.config.runs {
            let outcome = if run == 0 {
                self.run_trial(condition, sink)
            } else {
                self.run_trial(condition, &mut NullSink)
            }
            .map_err(|e| ExperimentError::Trial {
                condition: condition.label().to_string(),
                run: run + 1,
                source: Box::new(e),
            })?;

            debug!(condition = condition.slug(), run = run + 1, elapsed = outcome.elapsed, "trial complete");
            times.push(outcome.elapsed);
            match first.as_ref().map(|f| f.result) {
                Some(result) => stable &= result == outcome.result,
                None => first = Some(outcome),
            }
        }

        let first = first.ok_or_else(|| ExperimentError::Config("runs must be at least 1".to_string()))?;
        let summary = Summary::of(&times);
        info!(
            condition = condition.slug(),
            promotions = first.promotions,
            mean = summary.mean,
            stddev = summary.stddev,
            "condition complete"
        );

        Ok(ConditionResult {
            condition,
            name: condition.slug(),
            label: condition.label(),
            promotions: first.promotions,
            inlined: first.link.inlined,
            inlined_candidates: first.link.inlined_candidates,
            times,
            summary,
            result: first.result,
            stable,
        })
    }
}

/// Build the profile the configuration asks for
///
/// With a `capacity`, callee names beyond the limit are dropped and priced
/// cold.
pub fn build_profile(source: ProfileSource, capacity: Option<usize>) -> ExperimentResult<ProfileStore> {
    let mut profile = capacity.map_or_else(ProfileStore::new, ProfileStore::bounded);
    match source {
        ProfileSource::Synthetic => benchmark::record_synthetic(&mut profile),
        ProfileSource::Static => {
            let module = parse_module(&benchmark::source())?;
            profile_unit(&module, &mut profile);
        }
    }
    if profile.dropped() > 0 {
        warn!(
            capacity = ?capacity,
            dropped = profile.dropped(),
            "profile store full, dropped callees default to cold"
        );
    }
    Ok(profile)
}
