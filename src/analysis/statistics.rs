//! Summary statistics over score samples.

use serde::{Deserialize, Serialize};

/// Minimum, mean and maximum of a set of score samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// Number of samples summarized.
    pub count: usize,
}

impl ScoreStats {
    /// Summarizes `samples`. Returns `None` for an empty slice.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let (min, max, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &s| (min.min(s), max.max(s), sum + s),
        );

        Some(Self {
            min,
            mean: sum / samples.len() as f64,
            max,
            count: samples.len(),
        })
    }
}
