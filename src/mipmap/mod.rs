//! Spectrogram mipmaps: magnitude images, the level pyramid, slice geometry,
//! and the in-process store that produces levels on demand.
//!
//! A [`Mipmap`] stores rows in frequency-ascending order: row 0 is the lowest
//! frequency bin. Everything in this module (slice `top`, margins) uses that
//! orientation; the compositor flips rows when drawing.

pub mod pyramid;
pub mod slice;
pub mod store;

use std::fmt;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

pub use pyramid::{build_pyramid, select_level, PyramidDescriptor, SelectedLevel};
pub use slice::{add_margin, MarginSpan, SliceArgs, SourceRect};
pub use store::{MipmapSource, MipmapStore, PlannedSlice};

/// Errors raised while building or resizing mipmaps.
#[derive(Debug, thiserror::Error)]
pub enum MipmapError {
    #[error("Sample count {got} does not match {width}x{height}")]
    ShapeMismatch { width: u32, height: u32, got: usize },
    #[error("Mipmap dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
}

/// Stable identifier of one channel of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub track_id: u32,
    pub channel: u32,
}

impl ChannelKey {
    pub fn new(track_id: u32, channel: u32) -> Self {
        Self { track_id, channel }
    }

    /// Index of the worker that owns this channel in a pool of `n_workers`.
    ///
    /// Repeated requests for a channel always land on the same worker, which
    /// keeps per-channel ordering.
    pub fn worker_index(&self, n_workers: usize) -> usize {
        let n = n_workers.max(1) as u64;
        ((self.track_id as u64 + self.channel as u64 * 100) % n) as usize
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.track_id, self.channel)
    }
}

/// Frequency axis scale used to map Hz onto mipmap rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreqScale {
    #[default]
    Linear,
    Mel,
}

impl FreqScale {
    /// Relative position of `hz` inside `hz_range`, 0 at the low bound and 1 at the high bound.
    pub fn hz_to_relative(&self, hz: f32, hz_range: (f32, f32)) -> f32 {
        let (lo, hi, x) = match self {
            FreqScale::Linear => (hz_range.0, hz_range.1, hz),
            FreqScale::Mel => (mel(hz_range.0), mel(hz_range.1), mel(hz)),
        };
        let span = hi - lo;
        if span <= 0.0 {
            return 0.0;
        }
        (x - lo) / span
    }
}

/// Perceptual (mel) scale.
#[inline]
pub fn mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// One resolution level of a channel's magnitude spectrogram.
#[derive(Clone, PartialEq)]
pub struct Mipmap {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl Mipmap {
    /// Wrap row-major linear magnitudes (row 0 = lowest frequency).
    pub fn new(width: u32, height: u32, samples: Vec<f32>) -> Result<Self, MipmapError> {
        if width == 0 || height == 0 {
            return Err(MipmapError::EmptyDimensions { width, height });
        }
        if samples.len() != width as usize * height as usize {
            return Err(MipmapError::ShapeMismatch {
                width,
                height,
                got: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Build from 16-bit normalized magnitudes as delivered by the compute backend.
    pub fn from_u16(width: u32, height: u32, samples: &[u16]) -> Result<Self, MipmapError> {
        let samples = samples
            .iter()
            .map(|&x| x as f32 / u16::MAX as f32)
            .collect();
        Self::new(width, height, samples)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Produce a lower-resolution level with a Lanczos-3 filter.
    pub fn resized(&self, width: u32, height: u32) -> Result<Self, MipmapError> {
        if width == 0 || height == 0 {
            return Err(MipmapError::EmptyDimensions { width, height });
        }
        if (width, height) == self.size() {
            return Ok(self.clone());
        }
        let src: ImageBuffer<Luma<f32>, &[f32]> =
            ImageBuffer::from_raw(self.width, self.height, self.samples.as_slice()).ok_or(
                MipmapError::ShapeMismatch {
                    width: self.width,
                    height: self.height,
                    got: self.samples.len(),
                },
            )?;
        let dst = imageops::resize(&src, width, height, FilterType::Lanczos3);
        Self::new(width, height, dst.into_raw())
    }
}

impl fmt::Debug for Mipmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mipmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mipmap_shape_validation() {
        assert!(Mipmap::new(4, 2, vec![0.0; 8]).is_ok());
        assert!(matches!(
            Mipmap::new(4, 2, vec![0.0; 7]),
            Err(MipmapError::ShapeMismatch { got: 7, .. })
        ));
        assert!(matches!(
            Mipmap::new(0, 2, vec![]),
            Err(MipmapError::EmptyDimensions { .. })
        ));
    }

    #[test]
    fn test_from_u16_normalizes() {
        let mipmap = Mipmap::from_u16(2, 1, &[0, u16::MAX]).unwrap();
        assert_eq!(mipmap.get(0, 0), Some(0.0));
        assert_eq!(mipmap.get(1, 0), Some(1.0));
        assert_eq!(mipmap.get(2, 0), None);
    }

    #[test]
    fn test_resized_keeps_constant_image() {
        let mipmap = Mipmap::new(64, 32, vec![0.5; 64 * 32]).unwrap();
        let half = mipmap.resized(32, 16).unwrap();
        assert_eq!(half.size(), (32, 16));
        assert!(half.samples().iter().all(|&v| (v - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_worker_index_is_stable() {
        let key = ChannelKey::new(3, 1);
        assert_eq!(key.worker_index(4), (3 + 100) % 4);
        assert_eq!(key.worker_index(4), key.worker_index(4));
        assert_eq!(key.worker_index(0), 0);
        assert_eq!(key.to_string(), "3_1");
    }

    #[test]
    fn test_mel_scale_is_monotonic() {
        let range = (0.0, 22050.0);
        let a = FreqScale::Mel.hz_to_relative(1000.0, range);
        let b = FreqScale::Mel.hz_to_relative(4000.0, range);
        assert!(a < b);
        // Mel spends more of the axis on low frequencies than linear does.
        assert!(a > FreqScale::Linear.hz_to_relative(1000.0, range));
        assert_eq!(FreqScale::Linear.hz_to_relative(5.0, (5.0, 5.0)), 0.0);
    }
}
