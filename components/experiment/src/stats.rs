//! Summary statistics over trial timings

use serde::Serialize;

/// Pooled standard deviations below this are treated as zero
const MIN_POOLED_SD: f64 = 1e-12;

/// Mean and sample standard deviation of a set of timings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Summary {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for fewer than two samples
    pub stddev: f64,
}

impl Summary {
    /// Summarize a sample; an empty sample gives zeros
    pub fn of(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let stddev = if samples.len() > 1 {
            let ss: f64 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Self { mean, stddev }
    }
}

/// Cohen's d of `a` against `b`, pooling the two standard deviations
///
/// Positive when `a` is slower than `b`. Returns 0 when both samples have
/// no spread.
pub fn cohen_d(a: &Summary, b: &Summary) -> f64 {
    let pooled = ((a.stddev * a.stddev + b.stddev * b.stddev) / 2.0).sqrt();
    if pooled < MIN_POOLED_SD {
        return 0.0;
    }
    (a.mean - b.mean) / pooled
}
