//! Frame scoring and threshold calibration.
//!
//! Scores are mean squared differences between consecutive frames.
//! A warm-up calibration over the empty scene establishes the noise
//! floor, and the motion threshold is derived from it.

mod calibration;
mod difference;
mod error;
mod statistics;
mod threshold;

pub use calibration::{CalibrationConfig, CalibrationResult, Calibrator};
pub use difference::DifferenceScorer;
pub use error::DetectionError;
pub use statistics::ScoreStats;
pub use threshold::{CalibrationWarning, SanityBounds, ThresholdMode};
