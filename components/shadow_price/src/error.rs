//! Error types for the shadow-price core

use thiserror::Error;

/// Errors surfaced by the shadow-price crate
///
/// The decision pass itself never fails; these come from parsing condition
/// names and from file-backed decision sinks.
#[derive(Debug, Error)]
pub enum ShadowPriceError {
    /// Condition name not recognized
    #[error("unknown condition `{0}` (expected one of: none, all, random, shadow, inverted)")]
    UnknownCondition(String),
    /// I/O failure writing a decision log
    #[error("decision log I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// CSV encoding failure writing a decision log
    #[error("decision log write failed: {0}")]
    Csv(#[from] csv::Error),
}
