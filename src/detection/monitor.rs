//! The motion monitoring loop.
//!
//! A run has two stages. Calibration pulls a warm-up series of frames
//! and fixes the threshold (skipped for a fixed threshold). Detection
//! then pulls one frame per iteration, paced by the frame interval,
//! feeds it to the [`MotionDetector`] and hands every motion event to
//! the [`Recorder`]. Errors from either stage end the run.

use super::{MotionDetector, StopSignal, Step};
use crate::analysis::{CalibrationResult, Calibrator, DetectionError, ThresholdMode};
use crate::capture::FrameSource;
use crate::config::MonitorConfig;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::recording::Recorder;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

/// A fatal run failure, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("calibration failed: {0}")]
    Calibration(#[source] DetectionError),

    #[error("motion detection failed: {0}")]
    Detection(#[source] DetectionError),
}

/// How many detection frames to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iterations {
    Bounded(u64),
    /// Run until stopped or until the source fails.
    Unbounded,
}

/// When to rerun calibration during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecalibrationPolicy {
    /// The threshold stays fixed for the whole run.
    #[default]
    Never,
    /// Recalibrate from post-event frames after every `n` events.
    AfterEvents(NonZeroU32),
}

/// What happened during a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Detection frames pulled (calibration frames excluded).
    pub frames: u64,
    /// Motion events raised.
    pub events: u64,
    /// Artifacts reported by the recorder.
    pub artifacts: usize,
    /// Events for which the recorder produced nothing.
    pub empty_recordings: u64,
    /// Number of recalibrations after the initial one.
    pub recalibrations: u32,
    /// True if the run ended because of a stop request.
    pub stopped: bool,
    /// Threshold in force at the end of the run.
    pub threshold: f64,
    /// Most recent calibration, if any ran.
    pub calibration: Option<CalibrationResult>,
    /// Score of the last frame that was scored.
    pub last_score: Option<f64>,
}

/// Drives calibration and detection against a frame source.
pub struct Monitor<R: Recorder> {
    config: MonitorConfig,
    recorder: R,
    stop: StopSignal,
    metrics: Option<MetricsRegistry>,
}

impl<R: Recorder> Monitor<R> {
    pub fn new(config: MonitorConfig, recorder: R) -> Self {
        Self {
            config,
            recorder,
            stop: StopSignal::new(),
            metrics: None,
        }
    }

    /// Uses an externally owned stop signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Publishes progress to a metrics registry.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle that stops this monitor's run.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Runs the calibration stage alone and reports the result.
    ///
    /// Elevated statistics are logged as warnings; the result is still
    /// returned.
    pub fn calibrate<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<CalibrationResult, RunError> {
        let calibration = Calibrator::new(&self.config.calibration)
            .with_stop_signal(self.stop.clone())
            .calibrate(source, self.config.capture.resolution)
            .map_err(RunError::Calibration)?;

        tracing::info!(
            min = format_args!("{:.2}", calibration.min()),
            mean = format_args!("{:.2}", calibration.mean()),
            max = format_args!("{:.2}", calibration.max()),
            "Calibration complete"
        );
        for warning in calibration.warnings(&self.config.calibration.bounds) {
            tracing::warn!("{}", warning);
        }
        tracing::info!(
            threshold = format_args!("{:.2}", calibration.threshold()),
            multiplier = calibration.multiplier(),
            "Using max deviation as motion threshold"
        );

        Ok(calibration)
    }

    /// Like [`Monitor::calibrate`], but a stop request yields `None`.
    fn calibrate_unless_stopped<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<Option<CalibrationResult>, RunError> {
        match self.calibrate(source) {
            Ok(calibration) => Ok(Some(calibration)),
            Err(RunError::Calibration(DetectionError::Cancelled)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Runs calibration (unless the threshold is fixed) followed by
    /// the detection loop.
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();

        let threshold = match self.config.threshold_mode() {
            ThresholdMode::Fixed(threshold) => {
                tracing::info!(threshold, "Using fixed motion threshold, calibration skipped");
                threshold
            }
            ThresholdMode::Calibrated => match self.calibrate_unless_stopped(source)? {
                Some(calibration) => {
                    summary.calibration = Some(calibration);
                    calibration.threshold()
                }
                None => {
                    tracing::info!("Stop requested during calibration");
                    summary.stopped = true;
                    return Ok(summary);
                }
            },
        };
        summary.threshold = threshold;
        self.publish(&summary);

        let mut detector = MotionDetector::new(threshold);
        self.detect(source, &mut detector, &mut summary)?;

        tracing::info!(
            frames = summary.frames,
            events = summary.events,
            artifacts = summary.artifacts,
            stopped = summary.stopped,
            "Monitoring finished"
        );
        Ok(summary)
    }

    fn detect<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        detector: &mut MotionDetector,
        summary: &mut RunSummary,
    ) -> Result<(), RunError> {
        let resolution = self.config.capture.resolution;
        let interval = self.config.frame_interval();
        let iterations = self.config.iterations();
        let policy = self.config.recalibration();
        let mut events_since_calibration: u32 = 0;

        loop {
            if let Iterations::Bounded(limit) = iterations {
                if summary.frames >= limit {
                    break;
                }
            }
            if summary.frames > 0 {
                pause(interval);
            }
            if self.stop.is_stopped() {
                tracing::info!(frames = summary.frames, "Stop requested");
                summary.stopped = true;
                break;
            }

            let frame = source
                .next_frame(resolution)
                .map_err(|e| RunError::Detection(e.into()))?;
            summary.frames += 1;

            match detector.step(frame).map_err(RunError::Detection)? {
                Step::Primed => {}
                Step::Still { score } => summary.last_score = Some(score),
                Step::Motion(event) => {
                    summary.last_score = Some(event.score);
                    summary.events += 1;
                    tracing::info!(
                        event = event.index,
                        score = format_args!("{:.2}", event.score),
                        threshold = format_args!("{:.2}", event.threshold),
                        "Motion detected! Recording"
                    );

                    let artifacts = self.recorder.on_motion_detected(&event);
                    if artifacts.is_empty() {
                        summary.empty_recordings += 1;
                        tracing::warn!(recorder = self.recorder.name(), "No artifacts could be saved");
                    } else {
                        tracing::info!(files = ?artifacts, "Artifacts saved");
                    }
                    summary.artifacts += artifacts.len();

                    events_since_calibration += 1;
                    if let RecalibrationPolicy::AfterEvents(every) = policy {
                        if events_since_calibration >= every.get() {
                            let Some(calibration) = self.calibrate_unless_stopped(source)? else {
                                tracing::info!(frames = summary.frames, "Stop requested during recalibration");
                                summary.stopped = true;
                                self.publish(summary);
                                break;
                            };
                            detector.recalibrate(calibration.threshold());
                            summary.calibration = Some(calibration);
                            summary.threshold = calibration.threshold();
                            summary.recalibrations += 1;
                            events_since_calibration = 0;
                        }
                    }
                }
            }

            self.publish(summary);
        }

        Ok(())
    }

    fn publish(&self, summary: &RunSummary) {
        if let Some(metrics) = &self.metrics {
            metrics.update(&MetricsSnapshot::from_summary(summary));
        }
    }
}

fn pause(interval: Duration) {
    if !interval.is_zero() {
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{
        CaptureConfig, Frame, FrameShape, ReplaySource, Resolution, SourceError, SyntheticScene,
        SyntheticSource,
    };
    use crate::detection::MotionEvent;
    use crate::recording::ArtifactId;

    /// Records events and optionally stops the run from inside the recorder.
    #[derive(Default)]
    struct TestRecorder {
        events: Vec<MotionEvent>,
        produce: usize,
        stop_after_first: Option<StopSignal>,
    }

    impl Recorder for TestRecorder {
        fn on_motion_detected(&mut self, event: &MotionEvent) -> Vec<ArtifactId> {
            self.events.push(event.clone());
            if let Some(stop) = &self.stop_after_first {
                stop.stop();
            }
            (0..self.produce).map(|i| format!("clip_{}_{}", event.index, i)).collect()
        }
    }

    fn config(iterations: Iterations) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.capture = CaptureConfig::with_resolution(Resolution::new(8, 4));
        config.calibration.samples = 3;
        config.calibration.interval_ms = 0;
        config.run.frame_interval_ms = 0;
        match iterations {
            Iterations::Bounded(n) => config.run.iterations = n,
            Iterations::Unbounded => config.run.continuous = true,
        }
        config
    }

    fn frames(levels: &[u8]) -> ReplaySource {
        ReplaySource::opened(levels.iter().enumerate().map(|(i, &v)| {
            Frame::filled(FrameShape::new(4, 8, 3), v, i as u64 + 1).unwrap()
        }))
    }

    #[test]
    fn test_bounded_run_with_calibration() {
        // Calibration: 10,11,10 -> scores 1,1 -> threshold 1.3.
        // Detection: 10 primes, 11 still, 30 motion, 30 primes, 31 still.
        let mut source = frames(&[10, 11, 10, 10, 11, 30, 30, 31]);
        let mut monitor = Monitor::new(
            config(Iterations::Bounded(5)),
            TestRecorder {
                produce: 3,
                ..Default::default()
            },
        );

        let summary = monitor.run(&mut source).unwrap();

        let calibration = summary.calibration.unwrap();
        assert_eq!(calibration.max(), 1.0);
        assert!((summary.threshold - 1.3).abs() < 1e-9);
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.artifacts, 3);
        assert_eq!(summary.last_score, Some(1.0));
        assert!(!summary.stopped);

        let events = &monitor.recorder().events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame_sequence, 6);
        assert_eq!(events[0].score, 361.0);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_fixed_threshold_skips_calibration() {
        let mut cfg = config(Iterations::Bounded(3));
        cfg.calibration.fixed_threshold = Some(3.0);
        let mut source = frames(&[0, 1, 2]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default());

        let summary = monitor.run(&mut source).unwrap();

        assert!(summary.calibration.is_none());
        assert_eq!(summary.threshold, 3.0);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.events, 0);
    }

    #[test]
    fn test_empty_recording_is_not_an_error() {
        let mut cfg = config(Iterations::Bounded(2));
        cfg.calibration.fixed_threshold = Some(0.0);
        let mut source = frames(&[0, 50]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default());

        let summary = monitor.run(&mut source).unwrap();

        assert_eq!(summary.events, 1);
        assert_eq!(summary.artifacts, 0);
        assert_eq!(summary.empty_recordings, 1);
    }

    #[test]
    fn test_calibration_failure_is_tagged() {
        let mut source = frames(&[0, 1]);
        let mut monitor = Monitor::new(config(Iterations::Bounded(5)), TestRecorder::default());

        let err = monitor.run(&mut source).unwrap_err();
        assert!(matches!(
            err,
            RunError::Calibration(DetectionError::Source(SourceError::Exhausted))
        ));
        assert!(err.to_string().starts_with("calibration failed"));
    }

    #[test]
    fn test_detection_failure_is_tagged() {
        let mut source = frames(&[0, 0, 0, 0]);
        let mut monitor = Monitor::new(config(Iterations::Bounded(5)), TestRecorder::default());

        let err = monitor.run(&mut source).unwrap_err();
        assert!(matches!(
            err,
            RunError::Detection(DetectionError::Source(SourceError::Exhausted))
        ));
    }

    #[test]
    fn test_shape_mismatch_during_detection_is_fatal() {
        let mut cfg = config(Iterations::Bounded(5));
        cfg.calibration.fixed_threshold = Some(10.0);
        let mut source = ReplaySource::opened([
            Frame::zeros(FrameShape::new(4, 8, 3), 1).unwrap(),
            Frame::zeros(FrameShape::new(4, 4, 3), 2).unwrap(),
        ]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default());

        assert!(matches!(
            monitor.run(&mut source),
            Err(RunError::Detection(DetectionError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_stop_before_next_pull_emits_nothing() {
        let mut cfg = config(Iterations::Unbounded);
        cfg.calibration.fixed_threshold = Some(1.0);
        let mut source = frames(&[0, 0, 200, 0]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default());
        monitor.stop_signal().stop();

        let summary = monitor.run(&mut source).unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.events, 0);
        assert_eq!(source.pulled(), 0);
        assert!(monitor.recorder().events.is_empty());
    }

    #[test]
    fn test_unbounded_run_stops_cooperatively() {
        let mut cfg = config(Iterations::Unbounded);
        cfg.calibration.fixed_threshold = Some(1.0);
        // The frame after the event would be another event against the
        // old reference; the stop lands before it is pulled.
        let mut source = frames(&[0, 100, 0, 100, 0]);
        let stop = StopSignal::new();
        let recorder = TestRecorder {
            stop_after_first: Some(stop.clone()),
            ..Default::default()
        };
        let mut monitor = Monitor::new(cfg, recorder).with_stop_signal(stop);

        let summary = monitor.run(&mut source).unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.events, 1);
        assert_eq!(source.remaining(), 3);
    }

    #[test]
    fn test_unbounded_run_ends_on_exhaustion() {
        let mut cfg = config(Iterations::Unbounded);
        cfg.calibration.fixed_threshold = Some(1.0);
        let mut source = frames(&[0, 0, 0]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default());

        assert!(matches!(
            monitor.run(&mut source),
            Err(RunError::Detection(DetectionError::Source(SourceError::Exhausted)))
        ));
    }

    #[test]
    fn test_stop_during_calibration_ends_run_cleanly() {
        let mut source = frames(&[0, 1, 0, 0, 50]);
        let mut monitor = Monitor::new(config(Iterations::Unbounded), TestRecorder::default());
        monitor.stop_signal().stop();

        let summary = monitor.run(&mut source).unwrap();

        assert!(summary.stopped);
        assert!(summary.calibration.is_none());
        assert_eq!(summary.frames, 0);
        assert_eq!(source.pulled(), 0);
    }

    #[test]
    fn test_stop_during_recalibration_ends_run_cleanly() {
        let mut cfg = config(Iterations::Unbounded);
        cfg.calibration.recalibrate_after_events = Some(1);
        // Initial calibration: 0,1,0. Detection: 0 primes, 50 motion,
        // which raises the stop before recalibration pulls anything.
        let mut source = frames(&[0, 1, 0, 0, 50, 50, 52, 50]);
        let stop = StopSignal::new();
        let recorder = TestRecorder {
            stop_after_first: Some(stop.clone()),
            ..Default::default()
        };
        let mut monitor = Monitor::new(cfg, recorder).with_stop_signal(stop);

        let summary = monitor.run(&mut source).unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.recalibrations, 0);
        assert!((summary.threshold - 1.3).abs() < 1e-9);
        assert_eq!(source.pulled(), 5);
    }

    #[test]
    fn test_recalibration_after_event() {
        let mut cfg = config(Iterations::Bounded(4));
        cfg.calibration.recalibrate_after_events = Some(1);
        // Initial calibration: 0,1,0 -> max 1 -> threshold 1.3
        // Detection: 0 primes, 50 motion
        // Recalibration: 50,52,50 -> max 4 -> threshold 5.2
        // Detection: 50 primes, 52 still (4 <= 5.2)
        let mut source = frames(&[0, 1, 0, 0, 50, 50, 52, 50, 50, 52]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default());

        let summary = monitor.run(&mut source).unwrap();

        assert_eq!(summary.recalibrations, 1);
        assert!((summary.threshold - 5.2).abs() < 1e-9);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.frames, 4);
        assert_eq!(summary.last_score, Some(4.0));
    }

    #[test]
    fn test_synthetic_scene_end_to_end() {
        let mut cfg = config(Iterations::Bounded(10));
        cfg.capture = CaptureConfig::with_resolution(Resolution::new(64, 36));
        cfg.calibration.samples = 5;
        let scene = SyntheticScene::default().with_disturbance_at(10);
        let mut source = SyntheticSource::new(scene);
        source.open(&cfg.capture).unwrap();

        let mut monitor = Monitor::new(cfg, TestRecorder::default());
        let summary = monitor.run(&mut source).unwrap();

        // Frames 1-5 calibrate; frame 10 is the 5th detection frame.
        assert_eq!(summary.events, 1);
        assert_eq!(monitor.recorder().events[0].frame_sequence, 10);
        let calibration = summary.calibration.unwrap();
        assert!(calibration.warnings(&Default::default()).is_empty());
    }

    #[test]
    fn test_metrics_are_published() {
        let mut cfg = config(Iterations::Bounded(2));
        cfg.calibration.fixed_threshold = Some(0.0);
        let registry = MetricsRegistry::new().unwrap();
        let mut source = frames(&[0, 9]);
        let mut monitor = Monitor::new(cfg, TestRecorder::default()).with_metrics(registry.clone());

        monitor.run(&mut source).unwrap();

        let output = registry.encode().unwrap();
        assert!(output.contains("cctv_motion_frames_total 2"));
        assert!(output.contains("cctv_motion_events_total 1"));
        assert!(output.contains("cctv_motion_last_score 81"));
    }
}
