//! Frame type representing a captured image with metadata.

use super::Resolution;
use std::fmt;
use std::time::Instant;

/// Dimensions of a frame buffer: rows, columns, interleaved channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameShape {
    /// Rows.
    pub height: usize,
    /// Columns.
    pub width: usize,
    /// Samples per pixel.
    pub channels: usize,
}

impl FrameShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Total number of samples (height * width * channels).
    #[inline]
    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Returns true if any dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Errors raised while building or reshaping a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero (got {0})")]
    ZeroDimension(FrameShape),
    #[error("pixel buffer holds {actual} samples, shape {shape} needs {expected}")]
    BufferSize {
        shape: FrameShape,
        expected: usize,
        actual: usize,
    },
    #[error("frame dimensions {0} do not fit a resolution")]
    DimensionTooLarge(FrameShape),
    #[error("cannot crop {shape} frame to {target}")]
    CropOutOfBounds { shape: FrameShape, target: Resolution },
}

/// A single captured frame at detector resolution.
///
/// Samples are stored row-major with interleaved channels, one `u8`
/// per channel. The shape is fixed at construction.
#[derive(Clone)]
pub struct Frame {
    /// Raw samples, `shape.len()` long.
    pixels: Vec<u8>,
    shape: FrameShape,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number assigned by the source.
    sequence: u64,
}

impl Frame {
    /// Creates a frame from a raw sample buffer.
    ///
    /// Width and height must each fit in a `u32`.
    pub fn new(pixels: Vec<u8>, shape: FrameShape, sequence: u64) -> Result<Self, FrameError> {
        if u32::try_from(shape.width).is_err() || u32::try_from(shape.height).is_err() {
            return Err(FrameError::DimensionTooLarge(shape));
        }
        if shape.is_empty() {
            return Err(FrameError::ZeroDimension(shape));
        }
        if pixels.len() != shape.len() {
            return Err(FrameError::BufferSize {
                shape,
                expected: shape.len(),
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            shape,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// Creates a frame with every sample set to `value`.
    pub fn filled(shape: FrameShape, value: u8, sequence: u64) -> Result<Self, FrameError> {
        Self::new(vec![value; shape.len()], shape, sequence)
    }

    /// Creates an all-black frame.
    pub fn zeros(shape: FrameShape, sequence: u64) -> Result<Self, FrameError> {
        Self::filled(shape, 0, sequence)
    }

    /// Returns the raw samples.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame shape.
    #[inline]
    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Returns the frame width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape.width
    }

    /// Returns the frame height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape.height
    }

    /// Returns the number of channels per pixel.
    #[inline]
    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the logical resolution of this frame.
    pub fn resolution(&self) -> Resolution {
        // Dimensions are checked against u32 in `new`.
        let clamp = |v: usize| u32::try_from(v).unwrap_or(u32::MAX);
        Resolution::new(clamp(self.shape.width), clamp(self.shape.height))
    }

    /// Crops the top-left `target` region out of this frame.
    ///
    /// Capture buffers are allocated at the padded resolution; the
    /// visible region is cut out before any scoring happens. Cropping to
    /// the frame's own resolution returns the frame unchanged.
    pub fn crop(self, target: Resolution) -> Result<Self, FrameError> {
        let (width, height) = (target.width as usize, target.height as usize);
        if width == self.shape.width && height == self.shape.height {
            return Ok(self);
        }
        if width == 0 || height == 0 || width > self.shape.width || height > self.shape.height {
            return Err(FrameError::CropOutOfBounds {
                shape: self.shape,
                target,
            });
        }

        let channels = self.shape.channels;
        let src_stride = self.shape.width * channels;
        let row_len = width * channels;
        let mut pixels = Vec::with_capacity(height * row_len);
        for row in self.pixels.chunks_exact(src_stride).take(height) {
            pixels.extend_from_slice(&row[..row_len]);
        }

        Ok(Self {
            pixels,
            shape: FrameShape::new(height, width, channels),
            timestamp: self.timestamp,
            sequence: self.sequence,
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("shape", &self.shape)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}
