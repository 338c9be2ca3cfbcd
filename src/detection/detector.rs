//! Reference-frame motion detector.
//!
//! The detector holds at most one reference frame. Every incoming frame
//! is scored against it; quiet frames become the new reference, and a
//! frame scoring above the threshold raises a motion event and drops
//! the reference. The frame after an event therefore starts a fresh
//! baseline instead of being compared across the recording gap.

use crate::analysis::{CalibrationResult, DetectionError, DifferenceScorer};
use crate::capture::Frame;
use chrono::{DateTime, Local};

/// Whether the detector currently holds a reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    /// No reference yet, or the last one was discarded after an event.
    Unset,
    /// Holding a reference frame.
    Idle,
}

/// A detected motion event.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent {
    /// 1-based event counter for this run.
    pub index: u64,
    /// Sequence number of the frame that triggered the event.
    pub frame_sequence: u64,
    /// Score of the triggering frame.
    pub score: f64,
    /// Threshold in force when the event fired.
    pub threshold: f64,
    /// Wall-clock time of detection.
    pub detected_at: DateTime<Local>,
}

/// Outcome of feeding one frame to the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The frame became the reference without being scored.
    Primed,
    /// Score at or below the threshold; the frame is the new reference.
    Still { score: f64 },
    /// Score above the threshold; the reference has been discarded.
    Motion(MotionEvent),
}

/// Stateful frame-by-frame motion classifier.
#[derive(Debug)]
pub struct MotionDetector {
    scorer: DifferenceScorer,
    threshold: f64,
    /// Last frame judged still. Owned exclusively by the detector.
    reference: Option<Frame>,
    events: u64,
    frames_scored: u64,
}

impl MotionDetector {
    /// Creates a detector in the `Unset` phase with a fixed threshold.
    pub fn new(threshold: f64) -> Self {
        Self {
            scorer: DifferenceScorer::new(),
            threshold,
            reference: None,
            events: 0,
            frames_scored: 0,
        }
    }

    /// Creates a detector using a calibrated threshold.
    pub fn from_calibration(calibration: &CalibrationResult) -> Self {
        Self::new(calibration.threshold())
    }

    /// Feeds the next frame.
    ///
    /// A scoring failure leaves the reference untouched and is returned
    /// to the caller; the detector makes no attempt to recover.
    pub fn step(&mut self, frame: Frame) -> Result<Step, DetectionError> {
        let Some(reference) = &self.reference else {
            tracing::debug!(sequence = frame.sequence(), "Reference frame established");
            self.reference = Some(frame);
            return Ok(Step::Primed);
        };

        let score = self.scorer.score(reference, &frame)?;
        self.frames_scored += 1;

        if score > self.threshold {
            self.events += 1;
            self.reference = None;
            let event = MotionEvent {
                index: self.events,
                frame_sequence: frame.sequence(),
                score,
                threshold: self.threshold,
                detected_at: Local::now(),
            };
            tracing::debug!(
                sequence = event.frame_sequence,
                score,
                threshold = self.threshold,
                "Score above threshold, reference discarded"
            );
            return Ok(Step::Motion(event));
        }

        tracing::trace!(sequence = frame.sequence(), score, "No motion");
        self.reference = Some(frame);
        Ok(Step::Still { score })
    }

    /// Installs a new threshold and drops the reference frame.
    pub fn recalibrate(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.reference = None;
    }

    /// Drops the reference frame.
    pub fn reset(&mut self) {
        self.reference = None;
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.reference.is_some() {
            DetectorPhase::Idle
        } else {
            DetectorPhase::Unset
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Current reference frame, if any.
    pub fn reference(&self) -> Option<&Frame> {
        self.reference.as_ref()
    }

    /// Motion events raised so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Frames that were scored against a reference.
    pub fn frames_scored(&self) -> u64 {
        self.frames_scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameShape;

    fn cctv(value: u8, sequence: u64) -> Frame {
        Frame::filled(FrameShape::new(360, 640, 3), value, sequence).unwrap()
    }

    fn small(value: u8, sequence: u64) -> Frame {
        Frame::filled(FrameShape::new(4, 4, 3), value, sequence).unwrap()
    }

    #[test]
    fn test_first_frame_primes_without_event() {
        let mut detector = MotionDetector::new(10.0);
        assert_eq!(detector.phase(), DetectorPhase::Unset);

        assert_eq!(detector.step(small(0, 1)).unwrap(), Step::Primed);
        assert_eq!(detector.phase(), DetectorPhase::Idle);
        assert_eq!(detector.frames_scored(), 0);
        assert_eq!(detector.events(), 0);
    }

    #[test]
    fn test_still_frame_replaces_reference() {
        let mut detector = MotionDetector::new(10.0);
        detector.step(small(0, 1)).unwrap();

        // 3^2 = 9 <= 10
        assert_eq!(detector.step(small(3, 2)).unwrap(), Step::Still { score: 9.0 });
        assert_eq!(detector.reference().unwrap().sequence(), 2);
        assert_eq!(detector.events(), 0);
    }

    #[test]
    fn test_score_equal_to_threshold_is_still() {
        let mut detector = MotionDetector::new(9.0);
        detector.step(small(0, 1)).unwrap();

        assert!(matches!(detector.step(small(3, 2)).unwrap(), Step::Still { .. }));
    }

    #[test]
    fn test_motion_discards_reference() {
        let mut detector = MotionDetector::new(10.0);
        detector.step(small(0, 1)).unwrap();

        // 4^2 = 16 > 10
        let Step::Motion(event) = detector.step(small(4, 2)).unwrap() else {
            panic!("expected motion");
        };
        assert_eq!(event.index, 1);
        assert_eq!(event.frame_sequence, 2);
        assert_eq!(event.score, 16.0);
        assert_eq!(event.threshold, 10.0);

        assert_eq!(detector.phase(), DetectorPhase::Unset);
        assert!(detector.reference().is_none());
        assert_eq!(detector.events(), 1);
    }

    #[test]
    fn test_frame_after_event_is_not_scored() {
        let mut detector = MotionDetector::new(10.0);
        detector.step(small(0, 1)).unwrap();
        detector.step(small(100, 2)).unwrap();

        // Compared against the discarded reference this would be motion.
        assert_eq!(detector.step(small(200, 3)).unwrap(), Step::Primed);
        assert_eq!(detector.reference().unwrap().sequence(), 3);
        assert_eq!(detector.frames_scored(), 1);

        assert!(matches!(detector.step(small(200, 4)).unwrap(), Step::Still { .. }));
    }

    #[test]
    fn test_cctv_zero_frames() {
        let mut detector = MotionDetector::new(0.0);
        detector.step(cctv(0, 1)).unwrap();

        assert_eq!(detector.step(cctv(0, 2)).unwrap(), Step::Still { score: 0.0 });
    }

    #[test]
    fn test_cctv_offset_twenty_triggers_below_400() {
        let mut detector = MotionDetector::new(399.9);
        detector.step(cctv(0, 1)).unwrap();

        let Step::Motion(event) = detector.step(cctv(20, 2)).unwrap() else {
            panic!("expected motion");
        };
        assert_eq!(event.score, 400.0);
    }

    #[test]
    fn test_cctv_offset_twenty_quiet_at_400() {
        let mut detector = MotionDetector::new(400.0);
        detector.step(cctv(0, 1)).unwrap();

        assert_eq!(detector.step(cctv(20, 2)).unwrap(), Step::Still { score: 400.0 });
    }

    #[test]
    fn test_shape_mismatch_keeps_reference() {
        let mut detector = MotionDetector::new(10.0);
        detector.step(small(0, 1)).unwrap();

        let other = Frame::zeros(FrameShape::new(4, 4, 1), 2).unwrap();
        assert!(matches!(
            detector.step(other),
            Err(DetectionError::ShapeMismatch { .. })
        ));
        assert_eq!(detector.reference().unwrap().sequence(), 1);
    }

    #[test]
    fn test_recalibrate_resets_reference() {
        let mut detector = MotionDetector::new(10.0);
        detector.step(small(0, 1)).unwrap();

        detector.recalibrate(2.0);
        assert_eq!(detector.threshold(), 2.0);
        assert_eq!(detector.phase(), DetectorPhase::Unset);
    }
}
