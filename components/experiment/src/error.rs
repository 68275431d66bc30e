//! Error types for the experiment harness

use jit_compiler::{CompileError, ParseError};
use shadow_price::ShadowPriceError;
use thiserror::Error;

/// Errors that abort an experiment
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Benchmark IR failed to load
    #[error("benchmark IR: {0}")]
    Parse(#[from] ParseError),
    /// Code generation or invocation failed
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Decision log or condition parsing failed
    #[error(transparent)]
    ShadowPrice(#[from] ShadowPriceError),
    /// Output could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Raw timing CSV could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// JSON report could not be produced
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Configuration rejected before running
    #[error("invalid configuration: {0}")]
    Config(String),
    /// One trial of a condition failed
    #[error("condition `{condition}` failed on run {run}: {source}")]
    Trial {
        /// Condition label
        condition: String,
        /// 1-based run number
        run: usize,
        /// Underlying failure
        #[source]
        source: Box<ExperimentError>,
    },
}

/// Result type for experiment operations
pub type ExperimentResult<T> = Result<T, ExperimentError>;
