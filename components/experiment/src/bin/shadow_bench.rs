//! Shadow-price inlining benchmark CLI
//!
//! Runs every selected condition against the benchmark module and prints
//! the profile, per-condition results, predictions and raw timings.

use clap::Parser;
use experiment::{benchmark, report, Cli, Experiment, ExperimentResult};
use jit_compiler::parse_module;
use shadow_price::ThresholdParams;
use std::io::{self, Write};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> ExperimentResult<()> {
    let experiment = Experiment::new(cli.to_config())?;
    let config = experiment.config();

    if cli.json {
        let results = experiment.run(|_, _| {})?;
        let summary = experiment.report(results);
        println!("{}", summary.to_json()?);
        if !summary.consistent {
            process::exit(1);
        }
        return Ok(());
    }

    println!("{}", report::format_header(config));
    println!("Phase 1: Profiling benchmark IR...");
    print!("{}", report::format_profile(experiment.profile()));
    println!();
    print!("{}", report::format_sizes(&parse_module(&benchmark::source())?));
    println!();
    print!("{}", report::format_thresholds(experiment.profile(), &ThresholdParams::default()));

    println!("\n================================================================");
    println!(
        "Phase 2+3: Running {} conditions x {} runs each...\n",
        config.conditions.len(),
        config.runs
    );
    let results = experiment.run(|i, r| {
        println!("{}", report::format_progress(i, r));
        let _ = io::stdout().flush();
    })?;

    let summary = experiment.report(results);
    println!();
    print!("{}", report::format_results(&summary.results));
    println!();
    print!("{}", report::format_predictions(&summary.predictions));

    if summary.consistent {
        println!("Result check: all conditions computed the same driver result");
    } else {
        println!("Result check: FAILED, conditions disagree on the driver result");
    }
    println!();

    println!("================================================================");
    println!("RAW TIMING DATA (for external statistical analysis)");
    println!("================================================================");
    report::write_raw_timings(io::stdout().lock(), &summary.results)?;

    if let Some(path) = &config.decision_log {
        println!("\nDecision log written to {}", path.display());
    }

    if !summary.consistent {
        process::exit(1);
    }
    Ok(())
}
