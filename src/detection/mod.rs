//! Motion detection.
//!
//! [`MotionDetector`] is the per-frame state machine; [`Monitor`] runs
//! it against a frame source, with calibration, pacing, cooperative
//! cancellation and recorder dispatch around it.

mod detector;
mod monitor;
mod signal;

pub use detector::{DetectorPhase, MotionDetector, MotionEvent, Step};
pub use monitor::{Iterations, Monitor, RecalibrationPolicy, RunError, RunSummary};
pub use signal::StopSignal;
