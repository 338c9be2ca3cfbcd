//! Metrics collection and registry.

use crate::detection::RunSummary;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of monitor state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Detection frames processed.
    pub frames_processed: u64,
    /// Motion events raised.
    pub motion_events: u64,
    /// Artifacts reported by the recorder.
    pub artifacts_recorded: u64,
    /// Events for which nothing was recorded.
    pub empty_recordings: u64,
    /// Recalibrations performed during the run.
    pub recalibrations: u64,
    /// Operating motion threshold.
    pub threshold: f64,
    /// Score of the most recently scored frame.
    pub last_score: Option<f64>,
    /// Calibration minimum, mean and maximum.
    pub calibration: Option<(f64, f64, f64)>,
}

/// Prometheus metrics registry for motion monitoring.
///
/// Cloning is cheap; clones share the same underlying metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Detection metrics
    frames_total: IntCounter,
    events_total: IntCounter,
    last_score: Gauge,
    threshold: Gauge,

    // Recording metrics
    artifacts_total: IntCounter,
    empty_recordings_total: IntCounter,

    // Calibration metrics
    recalibrations_total: IntCounter,
    calibration_min: Gauge,
    calibration_mean: Gauge,
    calibration_max: Gauge,
    calibrated: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all monitor metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_total = IntCounter::new(
            "cctv_motion_frames_total",
            "Total number of detection frames processed",
        )?;
        let events_total = IntCounter::new(
            "cctv_motion_events_total",
            "Total number of motion events detected",
        )?;
        let last_score = Gauge::new(
            "cctv_motion_last_score",
            "Mean squared difference of the most recently scored frame",
        )?;
        let threshold = Gauge::new(
            "cctv_motion_threshold",
            "Operating motion threshold",
        )?;

        let artifacts_total = IntCounter::new(
            "cctv_motion_artifacts_total",
            "Total artifacts produced by the recorder",
        )?;
        let empty_recordings_total = IntCounter::new(
            "cctv_motion_empty_recordings_total",
            "Motion events for which no artifact could be saved",
        )?;

        let recalibrations_total = IntCounter::new(
            "cctv_motion_recalibrations_total",
            "Recalibrations performed after motion events",
        )?;
        let calibration_min = Gauge::new(
            "cctv_motion_calibration_min",
            "Minimum consecutive-frame score during calibration",
        )?;
        let calibration_mean = Gauge::new(
            "cctv_motion_calibration_mean",
            "Mean consecutive-frame score during calibration",
        )?;
        let calibration_max = Gauge::new(
            "cctv_motion_calibration_max",
            "Maximum consecutive-frame score during calibration",
        )?;
        let calibrated = IntGauge::new(
            "cctv_motion_calibrated",
            "Whether the threshold came from calibration (1) or was fixed (0)",
        )?;

        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(last_score.clone()))?;
        registry.register(Box::new(threshold.clone()))?;
        registry.register(Box::new(artifacts_total.clone()))?;
        registry.register(Box::new(empty_recordings_total.clone()))?;
        registry.register(Box::new(recalibrations_total.clone()))?;
        registry.register(Box::new(calibration_min.clone()))?;
        registry.register(Box::new(calibration_mean.clone()))?;
        registry.register(Box::new(calibration_max.clone()))?;
        registry.register(Box::new(calibrated.clone()))?;

        Ok(Self {
            registry,
            frames_total,
            events_total,
            last_score,
            threshold,
            artifacts_total,
            empty_recordings_total,
            recalibrations_total,
            calibration_min,
            calibration_mean,
            calibration_max,
            calibrated,
        })
    }

    /// Updates all metrics from a snapshot of monitor state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        // Counters only move forward by the difference
        advance(&self.frames_total, snapshot.frames_processed);
        advance(&self.events_total, snapshot.motion_events);
        advance(&self.artifacts_total, snapshot.artifacts_recorded);
        advance(&self.empty_recordings_total, snapshot.empty_recordings);
        advance(&self.recalibrations_total, snapshot.recalibrations);

        self.threshold.set(snapshot.threshold);
        if let Some(score) = snapshot.last_score {
            self.last_score.set(score);
        }

        match snapshot.calibration {
            Some((min, mean, max)) => {
                self.calibration_min.set(min);
                self.calibration_mean.set(mean);
                self.calibration_max.set(max);
                self.calibrated.set(1);
            }
            None => self.calibrated.set(0),
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from a (possibly in-progress) run summary.
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            frames_processed: summary.frames,
            motion_events: summary.events,
            artifacts_recorded: summary.artifacts as u64,
            empty_recordings: summary.empty_recordings,
            recalibrations: u64::from(summary.recalibrations),
            threshold: summary.threshold,
            last_score: summary.last_score,
            calibration: summary.calibration.map(|c| (c.min(), c.mean(), c.max())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            frames_processed: 10,
            motion_events: 2,
            artifacts_recorded: 6,
            empty_recordings: 0,
            recalibrations: 0,
            threshold: 5.2,
            last_score: Some(1.5),
            calibration: Some((1.0, 2.5, 4.0)),
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("cctv_motion_frames_total 10"));
        assert!(output.contains("cctv_motion_events_total 2"));
        assert!(output.contains("cctv_motion_threshold 5.2"));
        assert!(output.contains("cctv_motion_calibration_mean 2.5"));
        assert!(output.contains("cctv_motion_calibrated 1"));
    }

    #[test]
    fn test_counters_never_go_backwards() {
        let registry = MetricsRegistry::new().unwrap();

        registry.update(&MetricsSnapshot {
            frames_processed: 5,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            frames_processed: 3,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("cctv_motion_frames_total 5"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("cctv_motion_frames_total"));
        assert!(output.contains("cctv_motion_threshold"));
        assert!(output.contains("cctv_motion_calibration_max"));
    }
}
