//! Prometheus metrics exporter for motion monitoring.
//!
//! # Metrics Exposed
//!
//! ## Detection
//! - `cctv_motion_frames_total` - Detection frames processed
//! - `cctv_motion_events_total` - Motion events detected
//! - `cctv_motion_last_score` - Score of the most recently scored frame
//! - `cctv_motion_threshold` - Operating motion threshold
//!
//! ## Recording
//! - `cctv_motion_artifacts_total` - Artifacts produced by the recorder
//! - `cctv_motion_empty_recordings_total` - Events with nothing saved
//!
//! ## Calibration
//! - `cctv_motion_calibration_min` / `_mean` / `_max` - Warm-up score statistics
//! - `cctv_motion_calibrated` - 1 if the threshold was calibrated, 0 if fixed
//! - `cctv_motion_recalibrations_total` - Recalibrations after motion events
//!
//! # Example
//!
//! ```no_run
//! use cctv_motion::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     frames_processed: 100,
//!     motion_events: 2,
//!     artifacts_recorded: 6,
//!     threshold: 5.2,
//!     last_score: Some(1.4),
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
