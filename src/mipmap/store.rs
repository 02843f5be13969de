//! In-process mipmap store standing in for the compute backend.
//!
//! Holds each channel's full-resolution spectrogram and produces pyramid
//! levels on demand. Produced levels are cached; after each production only
//! the newest level and the smallest level are retained.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::pyramid::{build_pyramid, select_level, PyramidDescriptor};
use super::slice::SliceArgs;
use super::{ChannelKey, FreqScale, Mipmap, MipmapError};

/// Source of mipmap pixels consumed by the worker pool.
pub trait MipmapSource: Send + Sync {
    /// Pixels of `key` at exactly `width x height`, or `None` if that level
    /// cannot be produced (unknown channel, size outside the pyramid).
    fn get_mipmap(&self, key: ChannelKey, width: u32, height: u32) -> Option<Arc<Mipmap>>;
}

/// Level plan for one viewport of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedSlice {
    pub level: (u32, u32),
    pub args: SliceArgs,
    pub track_sec: f64,
    pub spec_hz_range: (f32, f32),
    pub freq_scale: FreqScale,
}

struct ChannelEntry {
    full: Arc<Mipmap>,
    pyramid: PyramidDescriptor,
    track_sec: f64,
    spec_hz_range: (f32, f32),
    cache: HashMap<(u32, u32), Arc<Mipmap>>,
}

impl ChannelEntry {
    fn cached(&self, size: (u32, u32)) -> Option<Arc<Mipmap>> {
        if size == self.full.size() {
            return Some(Arc::clone(&self.full));
        }
        self.cache.get(&size).cloned()
    }

    fn prune(&mut self, keep: (u32, u32)) {
        let smallest = self.pyramid.smallest();
        self.cache
            .retain(|&size, _| size == keep || size == smallest);
    }
}

/// Per-channel spectrogram pyramids.
pub struct MipmapStore {
    floor: u32,
    channels: RwLock<HashMap<ChannelKey, ChannelEntry>>,
}

impl MipmapStore {
    /// Create a store whose pyramids stop halving at `floor` pixels.
    pub fn new(floor: u32) -> Self {
        Self {
            floor: floor.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Install a freshly computed full-resolution spectrogram for `key`.
    ///
    /// Replaces any previous pyramid for the channel and eagerly produces the
    /// smallest level so a fallback is always available.
    pub fn set_spectrogram(
        &self,
        key: ChannelKey,
        full: Mipmap,
        track_sec: f64,
        spec_hz_range: (f32, f32),
    ) -> Result<PyramidDescriptor, MipmapError> {
        let pyramid = build_pyramid(full.width(), full.height(), self.floor);
        let smallest = pyramid.smallest();
        let mut cache = HashMap::new();
        if smallest != full.size() {
            let level = full.resized(smallest.0, smallest.1)?;
            cache.insert(smallest, Arc::new(level));
        }
        log::debug!(
            "Spectrogram for {} set: {}x{}, {} pyramid levels",
            key,
            full.width(),
            full.height(),
            pyramid.len()
        );
        let entry = ChannelEntry {
            full: Arc::new(full),
            pyramid: pyramid.clone(),
            track_sec,
            spec_hz_range,
            cache,
        };
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        Ok(pyramid)
    }

    pub fn remove(&self, key: ChannelKey) -> bool {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some()
    }

    pub fn clear(&self) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_empty(&self) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn contains(&self, key: ChannelKey) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    pub fn pyramid(&self, key: ChannelKey) -> Option<PyramidDescriptor> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|entry| entry.pyramid.clone())
    }

    /// Levels currently held in memory for `key`, excluding the full image.
    pub fn cached_levels(&self, key: ChannelKey) -> Vec<(u32, u32)> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let mut levels: Vec<_> = channels
            .get(&key)
            .map(|entry| entry.cache.keys().copied().collect())
            .unwrap_or_default();
        levels.sort_unstable();
        levels
    }

    /// Choose the level and slice for a viewport of `key`.
    pub fn get_pyramid_and_slice(
        &self,
        key: ChannelKey,
        sec_range: (f64, f64),
        hz_range: (f32, f32),
        margin_px: usize,
        freq_scale: FreqScale,
        max_texture_size: usize,
    ) -> Option<PlannedSlice> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let entry = channels.get(&key)?;
        let selected = select_level(
            &entry.pyramid,
            entry.track_sec,
            sec_range,
            entry.spec_hz_range,
            hz_range,
            margin_px,
            freq_scale,
            max_texture_size,
        )?;
        Some(PlannedSlice {
            level: selected.size(),
            args: selected.args,
            track_sec: entry.track_sec,
            spec_hz_range: entry.spec_hz_range,
            freq_scale,
        })
    }
}

impl MipmapSource for MipmapStore {
    fn get_mipmap(&self, key: ChannelKey, width: u32, height: u32) -> Option<Arc<Mipmap>> {
        let size = (width, height);
        let full = {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            let entry = channels.get(&key)?;
            if !entry.pyramid.contains(size) {
                log::warn!("Requested {}x{} is not a pyramid level of {}", width, height, key);
                return None;
            }
            if let Some(hit) = entry.cached(size) {
                return Some(hit);
            }
            Arc::clone(&entry.full)
        };

        // Resize outside the lock; other channels keep being served meanwhile.
        let level = match full.resized(width, height) {
            Ok(level) => Arc::new(level),
            Err(err) => {
                log::error!("Failed to produce mipmap {}x{} for {}: {}", width, height, key, err);
                return None;
            }
        };

        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = channels.get_mut(&key) {
            // The channel may have been reloaded while resizing.
            if Arc::ptr_eq(&entry.full, &full) {
                entry.cache.insert(size, Arc::clone(&level));
                entry.prune(size);
            }
        }
        Some(level)
    }
}
