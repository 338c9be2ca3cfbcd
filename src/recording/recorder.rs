//! Recorder contract.

use crate::detection::MotionEvent;
use thiserror::Error;

/// Identifier of a persisted artifact, e.g. a snapshot name.
pub type ArtifactId = String;

/// Errors a recorder may hit internally.
///
/// These are logged by the recorder and never returned to the
/// detection loop.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("snapshot capture failed: {0}")]
    CaptureFailed(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downstream action taken when motion is detected.
pub trait Recorder {
    /// Records the event and returns the artifacts produced.
    ///
    /// An empty vector means nothing could be persisted. Implementations
    /// must not panic on persistence failures.
    fn on_motion_detected(&mut self, event: &MotionEvent) -> Vec<ArtifactId>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn on_motion_detected(&mut self, event: &MotionEvent) -> Vec<ArtifactId> {
        (**self).on_motion_detected(event)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Recorder that only logs events.
#[derive(Debug, Default)]
pub struct LogRecorder {
    events: u64,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen so far.
    pub fn events(&self) -> u64 {
        self.events
    }
}

impl Recorder for LogRecorder {
    fn on_motion_detected(&mut self, event: &MotionEvent) -> Vec<ArtifactId> {
        self.events += 1;
        tracing::info!(
            event = event.index,
            sequence = event.frame_sequence,
            score = event.score,
            at = %event.detected_at.format("%Y-%m-%d %H:%M:%S"),
            "Motion event logged"
        );
        Vec::new()
    }

    fn name(&self) -> &str {
        "log"
    }
}
