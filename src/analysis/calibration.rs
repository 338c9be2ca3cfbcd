//! Warm-up calibration of the motion threshold.
//!
//! A short run of consecutive frames of the empty scene is scored pair
//! by pair. The largest score seen, scaled by a safety multiplier,
//! becomes the operating threshold.

use super::{CalibrationWarning, DetectionError, DifferenceScorer, SanityBounds, ScoreStats};
use crate::capture::{Frame, FrameSource, Resolution};
use crate::detection::StopSignal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of frames pulled during warm-up (at least 2).
    pub samples: usize,
    /// Safety multiplier applied to the peak calibration score.
    pub multiplier: f64,
    /// Pause between calibration frames, in milliseconds.
    pub interval_ms: u64,
    /// Skip calibration and use this threshold instead.
    pub fixed_threshold: Option<f64>,
    /// Recalibrate after this many motion events.
    pub recalibrate_after_events: Option<u32>,
    /// Sanity bounds for warnings.
    pub bounds: SanityBounds,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: 20,
            multiplier: 1.3,
            interval_ms: 1000,
            fixed_threshold: None,
            recalibrate_after_events: None,
            bounds: SanityBounds::default(),
        }
    }
}

impl CalibrationConfig {
    /// Pause between calibration frames.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Outcome of a calibration run. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    stats: ScoreStats,
    multiplier: f64,
    threshold: f64,
}

impl CalibrationResult {
    /// Smallest consecutive-frame score.
    pub fn min(&self) -> f64 {
        self.stats.min
    }

    /// Mean consecutive-frame score.
    pub fn mean(&self) -> f64 {
        self.stats.mean
    }

    /// Largest consecutive-frame score.
    pub fn max(&self) -> f64 {
        self.stats.max
    }

    /// Number of scores the result was derived from.
    pub fn sample_count(&self) -> usize {
        self.stats.count
    }

    /// Multiplier that was applied to `max`.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Operating threshold: `max * multiplier`.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Full statistics.
    pub fn stats(&self) -> &ScoreStats {
        &self.stats
    }

    /// Checks the statistics against sanity bounds.
    pub fn warnings(&self, bounds: &SanityBounds) -> Vec<CalibrationWarning> {
        bounds.check(&self.stats)
    }
}

/// Runs warm-up calibration against a frame source.
#[derive(Debug, Clone)]
pub struct Calibrator {
    samples: usize,
    multiplier: f64,
    interval: Duration,
    scorer: DifferenceScorer,
    stop: Option<StopSignal>,
}

impl Calibrator {
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            samples: config.samples,
            multiplier: config.multiplier,
            interval: config.interval(),
            scorer: DifferenceScorer::new(),
            stop: None,
        }
    }

    /// Overrides the number of frames to pull.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Overrides the pause between frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Abandons calibration once `stop` is raised.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Pulls `samples` frames and derives the threshold.
    ///
    /// Each frame is scored against its immediate predecessor only,
    /// giving `samples - 1` scores. The source is asked to settle
    /// before the first frame. Nothing is retried: any source or
    /// scoring failure aborts calibration.
    ///
    /// The stop signal, if any, is checked before every pull and yields
    /// [`DetectionError::Cancelled`].
    pub fn calibrate<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        resolution: Resolution,
    ) -> Result<CalibrationResult, DetectionError> {
        if self.samples < 2 {
            return Err(DetectionError::InsufficientSamples {
                requested: self.samples,
            });
        }

        source.settle()?;
        tracing::info!(
            frames = self.samples,
            resolution = %resolution,
            "Calibrating motion threshold"
        );

        let mut previous: Option<Frame> = None;
        let mut scores = Vec::with_capacity(self.samples - 1);

        for i in 0..self.samples {
            if i > 0 && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
            if self.stop.as_ref().is_some_and(StopSignal::is_stopped) {
                tracing::info!(pulled = i, "Calibration stopped");
                return Err(DetectionError::Cancelled);
            }

            let frame = source.next_frame(resolution)?;
            if let Some(prev) = &previous {
                let score = self.scorer.score(prev, &frame)?;
                tracing::debug!(sequence = frame.sequence(), score, "Calibration sample");
                scores.push(score);
            }
            previous = Some(frame);
        }

        self.summarize(&scores)
    }

    /// Derives a calibration result from already computed scores.
    pub fn summarize(&self, scores: &[f64]) -> Result<CalibrationResult, DetectionError> {
        let stats = ScoreStats::from_samples(scores).ok_or(DetectionError::InsufficientSamples {
            requested: scores.len() + 1,
        })?;

        Ok(CalibrationResult {
            stats,
            multiplier: self.multiplier,
            threshold: stats.max * self.multiplier,
        })
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(&CalibrationConfig::default())
    }
}
