//! Peer statistics and standard score
//!
//! Plain float arithmetic. Empty inputs and zero deviations are not guarded:
//! they produce NaN / ±inf and the caller decides what to do with it.

use serde::Serialize;

/// Points added per population standard deviation
pub const SCORE_SCALE: f64 = 10.0;
/// Score of a value sitting exactly on the peer mean
pub const SCORE_CENTER: f64 = 50.0;

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor N) around `mean`. NaN for an empty slice.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squared / values.len() as f64).sqrt()
}

/// `(value - mean) / std_dev * 10 + 50`
pub fn standard_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    (value - mean) / std_dev * SCORE_SCALE + SCORE_CENTER
}

/// Mean and deviation of one metric across the peer set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeerStatistics {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl PeerStatistics {
    pub fn from_values(values: &[f64]) -> Self {
        let mean = mean(values);
        Self {
            count: values.len(),
            mean,
            std_dev: population_std_dev(values, mean),
        }
    }

    pub fn score(&self, value: f64) -> f64 {
        standard_score(value, self.mean, self.std_dev)
    }

    /// Zero deviation: every score computed against it is non-finite
    pub fn is_degenerate(&self) -> bool {
        self.std_dev == 0.0 || !self.std_dev.is_finite()
    }
}
