//! Snapshot-sequence recorder.
//!
//! Takes a short burst of snapshots whenever motion is detected. Each
//! snapshot is named `<prefix>_<YYYYmmddHHMMSS>_<i>`. A failed snapshot
//! is logged and skipped; the rest of the burst still runs.

use super::{ArtifactId, Recorder, RecorderError};
use crate::config::MonitorConfig;
use crate::detection::MotionEvent;
use chrono::Local;
use std::time::Duration;

/// Something that can take and store a named snapshot.
pub trait SnapshotSink {
    fn capture(&mut self, name: &str) -> Result<(), RecorderError>;
}

impl<F> SnapshotSink for F
where
    F: FnMut(&str) -> Result<(), RecorderError>,
{
    fn capture(&mut self, name: &str) -> Result<(), RecorderError> {
        self(name)
    }
}

/// Records a fixed number of snapshots per motion event.
pub struct SequenceRecorder<K: SnapshotSink> {
    sink: K,
    count: u32,
    pause: Duration,
    prefix: String,
}

impl<K: SnapshotSink> SequenceRecorder<K> {
    /// Three snapshots, one second apart.
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            count: 3,
            pause: Duration::from_secs(1),
            prefix: "seq".to_string(),
        }
    }

    /// Burst size and pause taken from the `[output]` section.
    pub fn from_config(sink: K, config: &MonitorConfig) -> Self {
        Self::new(sink)
            .with_count(config.output.snapshots_per_event)
            .with_pause(config.snapshot_interval())
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Snapshots taken per event.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Returns the underlying sink.
    pub fn sink(&self) -> &K {
        &self.sink
    }
}

impl<K: SnapshotSink> Recorder for SequenceRecorder<K> {
    fn on_motion_detected(&mut self, event: &MotionEvent) -> Vec<ArtifactId> {
        let mut saved = Vec::with_capacity(self.count as usize);

        for i in 0..self.count {
            let name = format!(
                "{}_{}_{}",
                self.prefix,
                Local::now().format("%Y%m%d%H%M%S"),
                i
            );
            match self.sink.capture(&name) {
                Ok(()) => {
                    saved.push(name);
                    if i + 1 < self.count && !self.pause.is_zero() {
                        std::thread::sleep(self.pause);
                    }
                }
                Err(e) => {
                    tracing::warn!(event = event.index, snapshot = %name, error = %e, "Snapshot failed");
                }
            }
        }

        saved
    }

    fn name(&self) -> &str {
        "sequence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> MotionEvent {
        MotionEvent {
            index: 1,
            frame_sequence: 42,
            score: 500.0,
            threshold: 5.2,
            detected_at: Local::now(),
        }
    }

    #[test]
    fn test_all_snapshots_saved() {
        let mut taken = Vec::new();
        let sink = |name: &str| -> Result<(), RecorderError> {
            taken.push(name.to_string());
            Ok(())
        };
        let mut recorder = SequenceRecorder::new(sink).with_pause(Duration::ZERO);

        let artifacts = recorder.on_motion_detected(&event());
        drop(recorder);

        assert_eq!(artifacts.len(), 3);
        assert_eq!(artifacts, taken);
        for (i, name) in artifacts.iter().enumerate() {
            assert!(name.starts_with("seq_"));
            assert!(name.ends_with(&format!("_{}", i)));
            // seq_ + 14 timestamp digits + _ + index
            assert_eq!(name.len(), 4 + 14 + 2);
        }
    }

    #[test]
    fn test_failed_snapshot_is_skipped() {
        let mut calls = 0;
        let sink = |_: &str| -> Result<(), RecorderError> {
            calls += 1;
            if calls == 2 {
                Err(RecorderError::CaptureFailed("disk full".into()))
            } else {
                Ok(())
            }
        };
        let mut recorder = SequenceRecorder::new(sink)
            .with_pause(Duration::ZERO)
            .with_prefix("cam");

        let artifacts = recorder.on_motion_detected(&event());

        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[0].ends_with("_0"));
        assert!(artifacts[1].ends_with("_2"));
        assert!(artifacts.iter().all(|a| a.starts_with("cam_")));
    }

    #[test]
    fn test_total_failure_yields_no_artifacts() {
        let sink = |_: &str| -> Result<(), RecorderError> {
            Err(RecorderError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        };
        let mut recorder = SequenceRecorder::new(sink).with_pause(Duration::ZERO);

        assert!(recorder.on_motion_detected(&event()).is_empty());
    }

    #[test]
    fn test_burst_follows_output_config() {
        let config = MonitorConfig::from_toml(
            r#"
            [output]
            snapshots_per_event = 5
            snapshot_interval_ms = 0
            "#,
        )
        .unwrap();
        let mut taken = 0;
        let sink = |_: &str| -> Result<(), RecorderError> {
            taken += 1;
            Ok(())
        };
        let mut recorder = SequenceRecorder::from_config(sink, &config);
        assert_eq!(recorder.count(), 5);
        assert_eq!(recorder.pause(), Duration::ZERO);

        assert_eq!(recorder.on_motion_detected(&event()).len(), 5);
        drop(recorder);
        assert_eq!(taken, 5);

        let defaults = SequenceRecorder::from_config(
            |_: &str| -> Result<(), RecorderError> { Ok(()) },
            &MonitorConfig::default(),
        );
        assert_eq!(defaults.count(), 3);
        assert_eq!(defaults.pause(), Duration::from_secs(1));
    }

    #[test]
    fn test_boxed_recorder() {
        let mut recorder: Box<dyn Recorder> = Box::new(crate::recording::LogRecorder::new());
        assert!(recorder.on_motion_detected(&event()).is_empty());
        assert_eq!(recorder.name(), "log");
    }
}
