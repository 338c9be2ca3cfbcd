//! Errors raised by scoring and calibration.

use crate::capture::{FrameShape, SourceError};
use thiserror::Error;

/// Fatal errors in the scoring path.
///
/// None of these are retried. They propagate straight to the caller,
/// which tags them with the stage that failed.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("frame shape mismatch: {left} vs {right}")]
    ShapeMismatch { left: FrameShape, right: FrameShape },

    #[error("calibration needs at least 2 frames, {requested} requested")]
    InsufficientSamples { requested: usize },

    #[error("stopped before calibration finished")]
    Cancelled,

    #[error(transparent)]
    Source(#[from] SourceError),
}
