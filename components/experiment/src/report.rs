//! Report formatting
//!
//! Human-readable tables, the falsifiable predictions, raw timings as CSV,
//! and a JSON form of the whole report.

use crate::benchmark::SizeClass;
use crate::config::ExperimentConfig;
use crate::error::ExperimentResult;
use crate::stats::cohen_d;
use crate::trial::ConditionResult;
use jit_compiler::IRModule;
use serde::Serialize;
use shadow_price::{Condition, ProfileStore, ThresholdParams};
use std::fmt::Write as _;
use std::io::Write;

const RULE: &str = "================================================================";

/// Banner with the run parameters
pub fn format_header(config: &ExperimentConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Shadow-Price Inlining Experiment");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Benchmark: 8-function module (4 hot, 2 warm, 2 cold)");
    let _ = writeln!(out, "Iterations: {}", config.iterations);
    let _ = writeln!(out, "Runs per condition: {}", config.runs);
    let _ = writeln!(out, "Profile source: {:?}", config.profile_source);
    if let Some(capacity) = config.profile_capacity {
        let _ = writeln!(out, "Profile capacity: {} names", capacity);
    }
    out
}

/// Profile entries with counts and prices
pub fn format_profile(profile: &ProfileStore) -> String {
    let mut out = format!("  Shadow Prices ({} functions profiled):\n", profile.len());
    for entry in profile.iter() {
        let _ = writeln!(
            out,
            "    {:<20}  calls={:<10}  lambda={:.4}",
            entry.name, entry.call_count, entry.shadow_price
        );
    }
    if profile.dropped() > 0 {
        let _ = writeln!(out, "    ({} observations dropped: store full)", profile.dropped());
    }
    out
}

/// Instruction count of every function with its inlining class
pub fn format_sizes(module: &IRModule) -> String {
    let mut out = String::from("  Function sizes (IR instruction count):\n");
    for func in module.functions() {
        let n = func.instruction_count();
        let _ = writeln!(out, "    {:<20}  {} insns  {}", func.name, n, SizeClass::of(n).describe());
    }
    out
}

/// Shadow and inverted thresholds for every profiled callee
pub fn format_thresholds(profile: &ProfileStore, params: &ThresholdParams) -> String {
    let mut out = String::from("  Threshold decisions (shadow-price formula):\n");
    for entry in profile.iter() {
        let _ = writeln!(
            out,
            "    {:<20}  lambda={:.4}  T_shadow={:>3}  T_inverted={:>3}",
            entry.name,
            entry.shadow_price,
            params.threshold(entry.shadow_price, false),
            params.threshold(entry.shadow_price, true)
        );
    }
    out
}

/// One line of progress after a condition completes
pub fn format_progress(index: usize, result: &ConditionResult) -> String {
    format!(
        "  Condition {}: {} ... done (mutations={}, mean={:.4} s, sd={:.4} s, result={})",
        index + 1,
        result.label,
        result.promotions,
        result.summary.mean,
        result.summary.stddev,
        result.result
    )
}

/// Results table
pub fn format_results(results: &[ConditionResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "RESULTS SUMMARY");
    let _ = writeln!(out, "{}\n", RULE);
    let _ = writeln!(
        out,
        "{:<30}  {:>10}  {:>10}  {:>10}  {:>10}",
        "Condition", "Mean (s)", "SD (s)", "Mutations", "Inlined"
    );
    let _ = writeln!(
        out,
        "{:<30}  {:>10}  {:>10}  {:>10}  {:>10}",
        "-".repeat(30),
        "-".repeat(10),
        "-".repeat(10),
        "-".repeat(10),
        "-".repeat(10)
    );
    for r in results {
        let _ = writeln!(
            out,
            "{:<30}  {:>10.4}  {:>10.4}  {:>10}  {:>10}",
            r.label, r.summary.mean, r.summary.stddev, r.promotions, r.inlined
        );
    }
    out
}

/// A pairwise comparison against the shadow-price condition
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Short identifier, `P1` to `P4`
    pub id: &'static str,
    /// What is compared
    pub title: &'static str,
    /// Slug of the condition compared against
    pub against: &'static str,
    /// Mean time of the shadow-price condition
    pub shadow_mean: f64,
    /// Mean time of the other condition
    pub other_mean: f64,
    /// Effect size, positive when shadow-price is faster
    pub cohen_d: f64,
    /// Whether shadow-price was faster
    pub confirmed: bool,
    /// Verdict sentence
    pub verdict: &'static str,
}

struct PredictionDef {
    id: &'static str,
    title: &'static str,
    against: Condition,
    confirmed: &'static str,
    falsified: &'static str,
}

const PREDICTIONS: [PredictionDef; 4] = [
    PredictionDef {
        id: "P1",
        title: "Shadow-price vs Random 50%",
        against: Condition::Random,
        confirmed: "CONFIRMED: Shadow-price outperforms random",
        falsified: "FALSIFIED: Random matches or beats shadow-price",
    },
    PredictionDef {
        id: "P2",
        title: "Shadow-price vs No inlining",
        against: Condition::NoInline,
        confirmed: "CONFIRMED: Shadow-price outperforms no inlining",
        falsified: "FALSIFIED: No inlining matches or beats shadow-price",
    },
    PredictionDef {
        id: "P3",
        title: "Shadow-price vs Inverted-price (KILLER CONTROL)",
        against: Condition::InvertedPrice,
        confirmed: "CONFIRMED: Price signal carries information",
        falsified: "FALSIFIED: Inverted prices match or beat correct prices",
    },
    PredictionDef {
        id: "P4",
        title: "Shadow-price vs Blind inline-all",
        against: Condition::InlineAll,
        confirmed: "Shadow-price outperforms blind (discrimination helps)",
        falsified: "Blind matches or beats shadow-price (inlining everything is fine here)",
    },
];

/// Evaluate every prediction whose two conditions were run
pub fn predictions(results: &[ConditionResult]) -> Vec<Prediction> {
    let find = |c: Condition| results.iter().find(|r| r.condition == c);
    let Some(shadow) = find(Condition::ShadowPrice) else {
        return Vec::new();
    };

    PREDICTIONS
        .iter()
        .filter_map(|def| {
            let other = find(def.against)?;
            let confirmed = shadow.summary.mean < other.summary.mean;
            Some(Prediction {
                id: def.id,
                title: def.title,
                against: def.against.slug(),
                shadow_mean: shadow.summary.mean,
                other_mean: other.summary.mean,
                cohen_d: cohen_d(&other.summary, &shadow.summary),
                confirmed,
                verdict: if confirmed { def.confirmed } else { def.falsified },
            })
        })
        .collect()
}

/// Predictions block
pub fn format_predictions(predictions: &[Prediction]) -> String {
    let mut out = String::from("FALSIFIABLE PREDICTIONS:\n\n");
    if predictions.is_empty() {
        out.push_str("  (shadow-price condition not run)\n\n");
    }
    for p in predictions {
        let _ = writeln!(out, "  {}: {}", p.id, p.title);
        let _ = writeln!(
            out,
            "      Shadow={:.4} s, {}={:.4} s, Cohen's d={:.2}",
            p.shadow_mean, p.against, p.other_mean, p.cohen_d
        );
        let _ = writeln!(out, "      {}\n", p.verdict);
    }
    out
}

/// Whether every condition computed the same driver result in every run
pub fn results_consistent(results: &[ConditionResult]) -> bool {
    let Some(first) = results.first() else {
        return true;
    };
    results.iter().all(|r| r.stable && r.result == first.result)
}

/// Raw per-run timings as CSV: `condition,run,time_sec`
pub fn write_raw_timings<W: Write>(writer: W, results: &[ConditionResult]) -> ExperimentResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["condition", "run", "time_sec"])?;
    for r in results {
        for (run, time) in r.times.iter().enumerate() {
            let run = (run + 1).to_string();
            let time = format!("{:.6}", time);
            csv.write_record([r.label, run.as_str(), time.as_str()])?;
        }
    }
    csv.flush()?;
    Ok(())
}

/// Profile row in the JSON report
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    /// Callee name
    pub name: String,
    /// Observations
    pub calls: u64,
    /// Normalized price
    pub lambda: f64,
    /// Threshold under the shadow-price condition
    pub threshold_shadow: u32,
    /// Threshold under the inverted-price condition
    pub threshold_inverted: u32,
}

/// Everything an experiment produced
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    /// Settings used
    pub config: ExperimentConfig,
    /// Profile the decisions were made from
    pub profile: Vec<ProfileRow>,
    /// Per-condition results in run order
    pub results: Vec<ConditionResult>,
    /// Pairwise comparisons
    pub predictions: Vec<Prediction>,
    /// Whether all conditions computed the same result
    pub consistent: bool,
}

impl ExperimentReport {
    /// Assemble a report from finished results
    pub fn new(config: &ExperimentConfig, profile: &ProfileStore, results: Vec<ConditionResult>) -> Self {
        let params = ThresholdParams::default();
        let profile = profile
            .iter()
            .map(|e| ProfileRow {
                name: e.name.clone(),
                calls: e.call_count,
                lambda: e.shadow_price,
                threshold_shadow: params.threshold(e.shadow_price, false),
                threshold_inverted: params.threshold(e.shadow_price, true),
            })
            .collect();
        Self {
            config: config.clone(),
            profile,
            predictions: predictions(&results),
            consistent: results_consistent(&results),
            results,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> ExperimentResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
