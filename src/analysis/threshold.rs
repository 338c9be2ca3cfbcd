//! Motion threshold selection and calibration sanity bounds.
//!
//! A noisy or flickering scene during warm-up produces an elevated
//! threshold. That is reported, never treated as a failure.

use super::ScoreStats;
use serde::{Deserialize, Serialize};

/// Upper bounds on calibration statistics before a warning is raised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityBounds {
    /// Mean calibration score above which the scene is considered noisy.
    pub max_mean: f64,
    /// Peak calibration score above which the scene is considered noisy.
    pub max_peak: f64,
}

impl Default for SanityBounds {
    fn default() -> Self {
        Self {
            max_mean: 5.0,
            max_peak: 10.0,
        }
    }
}

impl SanityBounds {
    /// Checks calibration statistics against both bounds.
    ///
    /// Returns every bound that was exceeded; an empty vector means the
    /// calibration looked clean.
    pub fn check(&self, stats: &ScoreStats) -> Vec<CalibrationWarning> {
        let mut warnings = Vec::new();

        if stats.mean > self.max_mean {
            warnings.push(CalibrationWarning::ElevatedMean {
                observed: stats.mean,
                bound: self.max_mean,
            });
        }

        if stats.max > self.max_peak {
            warnings.push(CalibrationWarning::ElevatedPeak {
                observed: stats.max,
                bound: self.max_peak,
            });
        }

        warnings
    }
}

/// Non-fatal calibration findings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationWarning {
    #[error("mean deviation is above {bound} (at {observed:.2})")]
    ElevatedMean { observed: f64, bound: f64 },

    #[error("max deviation during calibration was above {bound} (at {observed:.2})")]
    ElevatedPeak { observed: f64, bound: f64 },
}

/// How the operating threshold is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ThresholdMode {
    /// Derive it from a warm-up calibration run.
    #[default]
    Calibrated,
    /// Use the given value and skip calibration entirely.
    Fixed(f64),
}
