//! Deterministic synthetic frame source.
//!
//! Renders a flat scene with seeded per-sample sensor noise. Individual
//! frames can be scripted to contain a disturbance (a brightness jump
//! across the whole frame), which is what a person walking through the
//! picture looks like to a mean-squared-difference scorer.

use super::{CaptureConfig, Frame, FrameSource, Resolution, SourceError};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::BTreeSet;

/// Scene parameters for [`SyntheticSource`].
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// Noise generator seed.
    pub seed: u64,
    /// Brightness of the static scene.
    pub base_level: u8,
    /// Maximum per-sample noise deviation, in either direction.
    pub noise: u8,
    /// Sequence numbers of frames that contain a disturbance.
    pub disturbances: BTreeSet<u64>,
    /// Brightness added to disturbed frames.
    pub disturbance_offset: u8,
    /// Number of frames before the source reports exhaustion.
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            seed: 0,
            base_level: 96,
            noise: 2,
            disturbances: BTreeSet::new(),
            disturbance_offset: 80,
            frame_limit: None,
        }
    }
}

impl SyntheticScene {
    /// Adds a disturbance at the given frame sequence number (1-based).
    pub fn with_disturbance_at(mut self, sequence: u64) -> Self {
        self.disturbances.insert(sequence);
        self
    }

    /// Stops producing frames after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }
}

/// Frame source that generates synthetic frames.
///
/// Frames are rendered into a buffer at the padded capture resolution
/// and cropped to the requested logical resolution, mirroring how a
/// real capture path hands frames to the detector.
pub struct SyntheticSource {
    scene: SyntheticScene,
    config: Option<CaptureConfig>,
    rng: ChaCha20Rng,
    sequence: u64,
}

impl SyntheticSource {
    pub fn new(scene: SyntheticScene) -> Self {
        let rng = ChaCha20Rng::seed_from_u64(scene.seed);
        Self {
            scene,
            config: None,
            rng,
            sequence: 0,
        }
    }

    /// Number of frames produced so far.
    pub fn produced(&self) -> u64 {
        self.sequence
    }

    fn sample(&mut self, level: u8) -> u8 {
        let noise = i16::from(self.scene.noise);
        if noise == 0 {
            return level;
        }
        let span = (2 * noise + 1) as u32;
        let delta = (self.rng.next_u32() % span) as i16 - noise;
        (i16::from(level) + delta).clamp(0, 255) as u8
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(SyntheticScene::default())
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), SourceError> {
        config
            .validate()
            .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.rng = ChaCha20Rng::seed_from_u64(self.scene.seed);
        self.sequence = 0;
        tracing::info!(
            resolution = %config.resolution,
            channels = config.channels,
            seed = self.scene.seed,
            "SyntheticSource opened"
        );
        Ok(())
    }

    fn next_frame(&mut self, resolution: Resolution) -> Result<Frame, SourceError> {
        let channels = match &self.config {
            Some(config) => config.channels,
            None => return Err(SourceError::NotOpen),
        };
        CaptureConfig {
            resolution,
            channels,
        }
        .validate()
        .map_err(|e| SourceError::ConfigFailed(e.to_string()))?;
        let channels = usize::from(channels);
        if self.scene.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(SourceError::Exhausted);
        }

        self.sequence += 1;
        let level = if self.scene.disturbances.contains(&self.sequence) {
            self.scene.base_level.saturating_add(self.scene.disturbance_offset)
        } else {
            self.scene.base_level
        };

        let shape = resolution.padded().shape(channels);
        let pixels: Vec<u8> = (0..shape.len()).map(|_| self.sample(level)).collect();

        let frame = Frame::new(pixels, shape, self.sequence)?.crop(resolution)?;
        tracing::trace!(sequence = self.sequence, level, "Synthetic frame rendered");
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        tracing::info!(produced = self.sequence, "SyntheticSource closed");
    }
}
