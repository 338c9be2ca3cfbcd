//! Capture geometry.
//!
//! The detector works on frames downsampled to a small logical
//! resolution. Capture buffers have to be allocated at an aligned size,
//! so the logical frame is cut out of a slightly larger padded buffer.

use super::FrameShape;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capture buffer width alignment in pixels.
pub const WIDTH_ALIGN: u32 = 32;
/// Capture buffer height alignment in pixels.
pub const HEIGHT_ALIGN: u32 = 16;

/// A (width, height) pair in pixels.
///
/// Serialized as a `"WxH"` string, e.g. `"640x360"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Full sensor resolution of the reference camera.
    pub const MAX: Resolution = Resolution::new(3280, 2464);
    /// 1080p.
    pub const HD: Resolution = Resolution::new(1920, 1080);
    /// Default detector resolution.
    pub const CCTV: Resolution = Resolution::new(640, 360);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Rounds width up to a multiple of 32 and height up to a multiple
    /// of 16, the shape a capture buffer must have.
    ///
    /// Only meaningful for resolutions that fit in the sensor
    /// (see [`CaptureConfig::validate`]).
    pub fn padded(&self) -> Resolution {
        Resolution {
            width: align_up(self.width, WIDTH_ALIGN),
            height: align_up(self.height, HEIGHT_ALIGN),
        }
    }

    /// Returns true if this resolution fits within the sensor.
    pub fn fits_sensor(&self) -> bool {
        self.width <= Self::MAX.width && self.height <= Self::MAX.height
    }

    /// Returns true if this resolution can size a capture buffer directly.
    pub fn is_aligned(&self) -> bool {
        self.width % WIDTH_ALIGN == 0 && self.height % HEIGHT_ALIGN == 0
    }

    /// Frame shape at this resolution with the given channel count.
    pub fn shape(&self, channels: usize) -> FrameShape {
        FrameShape::new(self.height as usize, self.width as usize, channels)
    }

    /// Number of pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

fn align_up(value: u32, align: u32) -> u32 {
    match value % align {
        0 => value,
        rem => value + (align - rem),
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::CCTV
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when a `WxH` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a valid resolution: {0:?} (expected WIDTHxHEIGHT)")]
pub struct ResolutionParseError(pub String);

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResolutionParseError(s.to_string());
        let (w, h) = s.trim().split_once('x').ok_or_else(invalid)?;
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(w) || !all_digits(h) {
            return Err(invalid());
        }
        let width = w.parse().map_err(|_| invalid())?;
        let height = h.parse().map_err(|_| invalid())?;
        Ok(Resolution::new(width, height))
    }
}

impl TryFrom<String> for Resolution {
    type Error = ResolutionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// Configuration for frame capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Logical detector resolution.
    pub resolution: Resolution,
    /// Channels per pixel (3 for RGB).
    pub channels: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::CCTV,
            channels: 3,
        }
    }
}

impl CaptureConfig {
    /// Creates a new RGB configuration at the given resolution.
    pub fn with_resolution(resolution: Resolution) -> Self {
        Self {
            resolution,
            ..Default::default()
        }
    }

    /// Shape of frames handed to the detector.
    pub fn frame_shape(&self) -> FrameShape {
        self.resolution.shape(usize::from(self.channels))
    }

    /// Shape of the padded capture buffer.
    pub fn buffer_shape(&self) -> FrameShape {
        self.resolution.padded().shape(usize::from(self.channels))
    }

    /// Validates the configuration parameters.
    ///
    /// The detector resolution must be non-zero and no larger than the
    /// full sensor resolution.
    pub fn validate(&self) -> Result<(), CaptureConfigError> {
        let res = self.resolution;
        if res.width == 0 || res.height == 0 || !res.fits_sensor() {
            return Err(CaptureConfigError::InvalidDimensions(self.resolution));
        }
        if !(1..=4).contains(&self.channels) {
            return Err(CaptureConfigError::InvalidChannels(self.channels));
        }
        Ok(())
    }
}

/// Capture configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureConfigError {
    #[error("invalid frame dimensions {0}")]
    InvalidDimensions(Resolution),
    #[error("invalid channel count {0} (must be 1-4)")]
    InvalidChannels(u8),
}
