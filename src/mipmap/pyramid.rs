//! Pyramid planning: enumerate mipmap levels and pick one for a viewport.

use super::slice::SliceArgs;
use super::FreqScale;

/// Every candidate level of one channel, grouped by height.
///
/// Row 0 holds the full height and starts with the full-resolution entry.
/// Widths never grow along a row and heights strictly shrink across rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidDescriptor {
    rows: Vec<Vec<(u32, u32)>>,
}

impl PyramidDescriptor {
    /// Candidate rows, largest height first.
    pub fn rows(&self) -> &[Vec<(u32, u32)>] {
        &self.rows
    }

    /// All levels in planning order.
    pub fn levels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.rows.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full-resolution level.
    pub fn full(&self) -> (u32, u32) {
        self.rows[0][0]
    }

    /// The smallest level, which is always cheap enough to keep around.
    pub fn smallest(&self) -> (u32, u32) {
        self.rows
            .last()
            .and_then(|row| row.last())
            .copied()
            .unwrap_or_else(|| self.full())
    }

    pub fn contains(&self, size: (u32, u32)) -> bool {
        self.levels().any(|level| level == size)
    }
}

/// Successive halvings of `full`, clamped to `floor`.
fn halvings(full: u32, floor: u32) -> Vec<u32> {
    let floor = floor.max(1);
    let mut out = vec![full];
    let mut current = full;
    while current > floor {
        let next = ((current as f64 / 2.0).round() as u32).max(floor);
        out.push(next);
        current = next;
    }
    out
}

/// Enumerate candidate levels for a full spectrogram of `full_width x full_height`.
///
/// Width is halved first down to `floor`, then height; every combination is kept.
pub fn build_pyramid(full_width: u32, full_height: u32, floor: u32) -> PyramidDescriptor {
    let full_width = full_width.max(1);
    let full_height = full_height.max(1);
    let widths = halvings(full_width, floor);
    let rows = halvings(full_height, floor)
        .into_iter()
        .map(|height| widths.iter().map(|&width| (width, height)).collect())
        .collect();
    PyramidDescriptor { rows }
}

/// A pyramid level chosen for a viewport, with its slice geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedLevel {
    pub width: u32,
    pub height: u32,
    pub args: SliceArgs,
}

impl SelectedLevel {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pick the largest level whose slice fits inside `max_texture_size` on both axes.
///
/// Within a row the first width that fits wins. Returns `None` when no level fits,
/// which callers treat as nothing to draw this frame.
#[allow(clippy::too_many_arguments)]
pub fn select_level(
    pyramid: &PyramidDescriptor,
    track_sec: f64,
    sec_range: (f64, f64),
    spec_hz_range: (f32, f32),
    hz_range: (f32, f32),
    margin_px: usize,
    freq_scale: FreqScale,
    max_texture_size: usize,
) -> Option<SelectedLevel> {
    for row in pyramid.rows() {
        for &(width, height) in row {
            let args = SliceArgs::new(
                width as usize,
                height as usize,
                track_sec,
                sec_range,
                spec_hz_range,
                hz_range,
                margin_px,
                freq_scale,
            );
            if args.height > max_texture_size {
                break;
            }
            if args.width <= max_texture_size {
                return Some(SelectedLevel {
                    width,
                    height,
                    args,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pyramid_full_resolution_first() {
        let pyramid = build_pyramid(4096, 1024, 256);
        assert_eq!(pyramid.full(), (4096, 1024));
        assert_eq!(pyramid.levels().next(), Some((4096, 1024)));
        assert_eq!(pyramid.smallest(), (256, 256));
        // widths 4096..256 (5) x heights 1024..256 (3)
        assert_eq!(pyramid.len(), 15);
    }

    #[test]
    fn test_pyramid_clamps_odd_sizes_to_floor() {
        let pyramid = build_pyramid(3000, 300, 1024);
        let widths: Vec<u32> = pyramid.rows()[0].iter().map(|&(w, _)| w).collect();
        assert_eq!(widths, vec![3000, 1500, 1024]);
        assert_eq!(pyramid.rows().len(), 1);
    }

    #[test]
    fn test_pyramid_below_floor_is_single_level() {
        let pyramid = build_pyramid(100, 50, 256);
        assert_eq!(pyramid.len(), 1);
        assert_eq!(pyramid.smallest(), (100, 50));
    }

    #[test]
    fn test_select_prefers_full_resolution_when_zoomed_in() {
        let pyramid = build_pyramid(4096, 1024, 256);
        let level = select_level(
            &pyramid,
            120.0,
            (10.0, 20.0),
            (0.0, 24000.0),
            (0.0, 12000.0),
            5,
            FreqScale::Linear,
            2048,
        )
        .unwrap();
        assert_eq!(level.size(), (4096, 1024));
    }

    #[test]
    fn test_select_downscales_when_zoomed_out() {
        let pyramid = build_pyramid(4096, 1024, 256);
        let level = select_level(
            &pyramid,
            120.0,
            (0.0, 120.0),
            (0.0, 24000.0),
            (0.0, 24000.0),
            5,
            FreqScale::Linear,
            1024,
        )
        .unwrap();
        assert_eq!(level.size(), (1024, 1024));
        assert!(level.args.width <= 1024);
    }

    #[test]
    fn test_select_none_when_nothing_fits() {
        let pyramid = build_pyramid(4096, 1024, 512);
        let level = select_level(
            &pyramid,
            120.0,
            (0.0, 120.0),
            (0.0, 24000.0),
            (0.0, 24000.0),
            0,
            FreqScale::Linear,
            256,
        );
        assert!(level.is_none());
    }
}
