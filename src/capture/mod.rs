//! Frame input and capture geometry.
//!
//! This module provides the frame buffer type, the capture resolution
//! rules and the [`FrameSource`] abstraction the detector pulls from.
//! Camera hardware itself lives behind that trait.

mod config;
mod frame;
mod source;
mod synthetic;

pub use config::{CaptureConfig, CaptureConfigError, Resolution, ResolutionParseError};
pub use frame::{Frame, FrameError, FrameShape};
pub use source::{FrameSource, ReplaySource, SourceError, SourceSession};
pub use synthetic::{SyntheticScene, SyntheticSource};
