//! Monitor configuration.
//!
//! Everything a run needs is collected in one [`MonitorConfig`], loaded
//! from a TOML file and/or overridden from the command line, then
//! passed to a [`Monitor`](crate::detection::Monitor) instance.

use crate::analysis::{CalibrationConfig, ThresholdMode};
use crate::capture::{CaptureConfig, CaptureConfigError};
use crate::detection::{Iterations, RecalibrationPolicy};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Capture(#[from] CaptureConfigError),
    #[error("calibration needs at least 2 frames (got {0})")]
    InvalidSamples(usize),
    #[error("threshold multiplier must be finite and positive (got {0})")]
    InvalidMultiplier(f64),
    #[error("fixed threshold must be finite and non-negative (got {0})")]
    InvalidThreshold(f64),
    #[error("recalibration interval must be at least one event")]
    InvalidRecalibration,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Run length and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Run until stopped (true) or for a fixed number of frames (false).
    pub continuous: bool,
    /// Number of frames to process if not continuous.
    pub iterations: u64,
    /// Pause between detection frames, in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            iterations: 30,
            frame_interval_ms: 2000,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Snapshots taken per motion event.
    pub snapshots_per_event: u32,
    /// Pause between snapshots, in milliseconds.
    pub snapshot_interval_ms: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshots_per_event: 3,
            snapshot_interval_ms: 1000,
            metrics_port: 9090,
        }
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl MonitorConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;

        let calibration = &self.calibration;
        if !calibration.multiplier.is_finite() || calibration.multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(calibration.multiplier));
        }
        match calibration.fixed_threshold {
            Some(t) if !t.is_finite() || t < 0.0 => return Err(ConfigError::InvalidThreshold(t)),
            Some(_) => {}
            None if calibration.samples < 2 => {
                return Err(ConfigError::InvalidSamples(calibration.samples))
            }
            None => {}
        }
        if calibration.recalibrate_after_events == Some(0) {
            return Err(ConfigError::InvalidRecalibration);
        }
        Ok(())
    }

    /// How the operating threshold is obtained.
    pub fn threshold_mode(&self) -> ThresholdMode {
        match self.calibration.fixed_threshold {
            Some(t) => ThresholdMode::Fixed(t),
            None => ThresholdMode::Calibrated,
        }
    }

    /// When to rerun calibration during a run.
    pub fn recalibration(&self) -> RecalibrationPolicy {
        self.calibration
            .recalibrate_after_events
            .and_then(NonZeroU32::new)
            .map_or(RecalibrationPolicy::Never, RecalibrationPolicy::AfterEvents)
    }

    /// Number of detection frames to process.
    pub fn iterations(&self) -> Iterations {
        if self.run.continuous {
            Iterations::Unbounded
        } else {
            Iterations::Bounded(self.run.iterations)
        }
    }

    /// Pause between detection frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.run.frame_interval_ms)
    }

    /// Pause between snapshots of one event.
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.output.snapshot_interval_ms)
    }
}
