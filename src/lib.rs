//! CCTV Motion Detection Library
//!
//! Watches a stream of downsampled camera frames and decides, frame by
//! frame, whether something moved. The motion threshold is calibrated
//! from the noise floor of the empty scene at startup, and a recorder
//! is triggered whenever a frame's score exceeds it.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → analysis (calibration, once) → detection → recording
//!                   ↑ scoring ↑
//! ```
//!
//! # Design Principles
//!
//! - **Adaptive threshold**: derived from the peak warm-up score times a
//!   safety multiplier, fixed for the rest of the run
//! - **Fresh baseline after events**: the frame after a motion event is
//!   never compared to the pre-event reference
//! - **Fail fast**: scoring and source errors end the run; recorder
//!   failures never reach the detection loop
//!
//! # Example
//!
//! ```no_run
//! use cctv_motion::{
//!     capture::{SourceSession, SyntheticScene, SyntheticSource},
//!     detection::Monitor,
//!     recording::LogRecorder,
//!     MonitorConfig,
//! };
//!
//! let config = MonitorConfig::default();
//! let mut camera = SyntheticSource::new(SyntheticScene::default().with_disturbance_at(25));
//! let mut session = SourceSession::open(&mut camera, &config.capture).unwrap();
//!
//! let mut monitor = Monitor::new(config, LogRecorder::new());
//! let summary = monitor.run(&mut *session).unwrap();
//! println!("{} motion events in {} frames", summary.events, summary.frames);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod capture;
pub mod config;
pub mod detection;
pub mod metrics;
pub mod recording;

// Re-export commonly used types at crate root
pub use analysis::{CalibrationResult, Calibrator, DetectionError, DifferenceScorer};
pub use capture::{CaptureConfig, Frame, FrameShape, FrameSource, Resolution};
pub use config::{ConfigError, MonitorConfig};
pub use detection::{Monitor, MotionDetector, MotionEvent, RunError, RunSummary, StopSignal};
pub use recording::{Recorder, SequenceRecorder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
