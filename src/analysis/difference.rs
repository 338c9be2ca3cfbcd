//! Frame dissimilarity scoring.
//!
//! The score of two frames is the mean of squared per-sample
//! differences, taken over every pixel and channel. Samples are widened
//! to a signed type before subtracting; `u8` arithmetic would wrap.

use super::DetectionError;
use crate::capture::Frame;

/// Computes the mean squared difference between two frames.
///
/// Stateless: identical inputs always give identical scores, and the
/// score is symmetric in its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceScorer;

impl DifferenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Scores `current` against `reference`.
    ///
    /// Fails with [`DetectionError::ShapeMismatch`] if the frames differ
    /// in height, width or channel count.
    pub fn score(&self, reference: &Frame, current: &Frame) -> Result<f64, DetectionError> {
        if reference.shape() != current.shape() {
            return Err(DetectionError::ShapeMismatch {
                left: reference.shape(),
                right: current.shape(),
            });
        }

        Ok(mean_squared_difference(reference.pixels(), current.pixels()))
    }
}

/// Mean of `(a[i] - b[i])^2` over equally sized sample buffers.
///
/// Each squared term is at most 255^2, so a `u64` accumulator cannot
/// overflow for any buffer that fits in memory.
fn mean_squared_difference(a: &[u8], b: &[u8]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }

    let sum: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = i32::from(i16::from(x) - i16::from(y));
            (d * d) as u64
        })
        .sum();

    sum as f64 / a.len() as f64
}
