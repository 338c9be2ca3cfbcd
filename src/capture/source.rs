//! Frame source abstraction.
//!
//! The detector pulls frames one at a time from a [`FrameSource`].
//! Real camera backends, the synthetic generator and recorded replays
//! all sit behind the same trait.

use super::{CaptureConfig, Frame, FrameError, Resolution};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// Errors that can occur while pulling frames.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame source exhausted")]
    Exhausted,
    #[error("frame source failed: {0}")]
    Failed(String),
    #[error("frame source not opened")]
    NotOpen,
    #[error("failed to configure frame source: {0}")]
    ConfigFailed(String),
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
}

/// Trait for frame producers.
///
/// `next_frame` blocks until a frame is available. Implementations
/// deliver frames strictly in capture order.
pub trait FrameSource {
    /// Opens and initializes the source with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError>;

    /// Pulls the next frame, cropped to `resolution`.
    fn next_frame(&mut self, resolution: Resolution) -> Result<Frame, SourceError>;

    /// Called once before calibration starts so the source can let
    /// automatic exposure and white balance settle.
    fn settle(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases resources.
    fn close(&mut self);
}

/// An open frame source that is closed again when dropped.
///
/// Dropping happens on every exit path, including early returns on
/// errors and cancellation.
pub struct SourceSession<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: FrameSource + ?Sized> SourceSession<'a, S> {
    /// Opens `source` and wraps it in a session.
    pub fn open(source: &'a mut S, config: &CaptureConfig) -> Result<Self, SourceError> {
        source.open(config)?;
        Ok(Self { source })
    }
}

impl<S: FrameSource + ?Sized> Deref for SourceSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.source
    }
}

impl<S: FrameSource + ?Sized> DerefMut for SourceSession<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.source
    }
}

impl<S: FrameSource + ?Sized> Drop for SourceSession<'_, S> {
    fn drop(&mut self) {
        if self.source.is_open() {
            self.source.close();
        }
    }
}

/// Replays a fixed queue of frames.
///
/// Frames are handed out exactly as queued; the requested resolution is
/// not applied. Once the queue is empty every pull fails with
/// [`SourceError::Exhausted`].
#[derive(Debug, Default)]
pub struct ReplaySource {
    frames: VecDeque<Frame>,
    open: bool,
    pulled: u64,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            open: false,
            pulled: 0,
        }
    }

    /// Creates an already opened replay source.
    pub fn opened(frames: impl IntoIterator<Item = Frame>) -> Self {
        let mut source = Self::new(frames);
        source.open = true;
        source
    }

    /// Appends a frame to the end of the queue.
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Frames still queued.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Frames handed out so far.
    pub fn pulled(&self) -> u64 {
        self.pulled
    }
}

impl FrameSource for ReplaySource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;
        self.open = true;
        tracing::debug!(queued = self.frames.len(), "ReplaySource opened");
        Ok(())
    }

    fn next_frame(&mut self, _resolution: Resolution) -> Result<Frame, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        let frame = self.frames.pop_front().ok_or(SourceError::Exhausted)?;
        self.pulled += 1;
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
        tracing::debug!(pulled = self.pulled, "ReplaySource closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameShape;

    fn frame(value: u8, sequence: u64) -> Frame {
        Frame::filled(FrameShape::new(2, 2, 1), value, sequence).unwrap()
    }

    #[test]
    fn test_replay_in_order_then_exhausted() {
        let mut source = ReplaySource::opened([frame(1, 1), frame(2, 2)]);
        let res = Resolution::new(2, 2);

        assert_eq!(source.next_frame(res).unwrap().sequence(), 1);
        assert_eq!(source.next_frame(res).unwrap().sequence(), 2);
        assert!(matches!(source.next_frame(res), Err(SourceError::Exhausted)));
        assert_eq!(source.pulled(), 2);
    }

    #[test]
    fn test_pull_without_open() {
        let mut source = ReplaySource::new([frame(1, 1)]);
        assert!(matches!(
            source.next_frame(Resolution::new(2, 2)),
            Err(SourceError::NotOpen)
        ));
    }

    #[test]
    fn test_session_closes_on_drop() {
        let mut source = ReplaySource::new([frame(1, 1)]);
        {
            let mut session = SourceSession::open(&mut source, &CaptureConfig::default()).unwrap();
            assert!(session.is_open());
            session.next_frame(Resolution::new(2, 2)).unwrap();
        }
        assert!(!source.is_open());
    }

    #[test]
    fn test_session_closes_on_error_path() {
        fn pull_two(source: &mut ReplaySource) -> Result<(), SourceError> {
            let mut session = SourceSession::open(source, &CaptureConfig::default())?;
            session.next_frame(Resolution::new(2, 2))?;
            session.next_frame(Resolution::new(2, 2))?;
            Ok(())
        }

        let mut source = ReplaySource::new([frame(1, 1)]);
        assert!(matches!(pull_two(&mut source), Err(SourceError::Exhausted)));
        assert!(!source.is_open());
    }
}
