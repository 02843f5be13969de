//! Slice geometry: which sub-rectangle of a mipmap covers a viewport.

use serde::Serialize;

use super::FreqScale;

/// Integer span widened by a margin, plus the fractional margins actually kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginSpan {
    pub start: usize,
    pub length: usize,
    pub pre_margin: f64,
    pub post_margin: f64,
}

/// Widen `[start, start + length)` by `margin` pixels on both sides.
///
/// The widened span is snapped outward to whole pixels and clamped to
/// `[0, max_length]`. Near the edges the reported margins are smaller than
/// `margin`. A non-positive `length` yields an empty span.
pub fn add_margin(start: f64, length: f64, max_length: usize, margin: usize) -> MarginSpan {
    if length.is_nan() || length <= 0.0 || !start.is_finite() {
        let start = start.floor().clamp(0.0, max_length as f64) as usize;
        return MarginSpan {
            start,
            length: 0,
            pre_margin: 0.0,
            post_margin: 0.0,
        };
    }
    let max = max_length as i64;
    let end = start + length;
    let start_w_margin = (start.floor() as i64 - margin as i64).clamp(0, max);
    let end_w_margin = (end.ceil() as i64 + margin as i64).clamp(start_w_margin, max);

    let pre_margin = (start - start_w_margin as f64).max(0.0);
    let post_margin = (end_w_margin as f64 - end).max(0.0);
    MarginSpan {
        start: start_w_margin as usize,
        length: (end_w_margin - start_w_margin) as usize,
        pre_margin,
        post_margin,
    }
}

/// Source rectangle of one mipmap level for a viewport, with resampling context.
///
/// `top` and `height` count rows from the lowest frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceArgs {
    pub px_per_sec: f64,
    pub left: usize,
    pub width: usize,
    pub top: usize,
    pub height: usize,
    pub left_margin: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
}

/// Fractional visible region, relative to the slice band origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SliceArgs {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_frames: usize,
        n_freqs: usize,
        track_sec: f64,
        sec_range: (f64, f64),
        spec_hz_range: (f32, f32),
        hz_range: (f32, f32),
        margin_px: usize,
        freq_scale: FreqScale,
    ) -> Self {
        let px_per_sec = if track_sec > 0.0 {
            n_frames as f64 / track_sec
        } else {
            0.0
        };
        let left_f64 = sec_range.0 * px_per_sec;
        let width_f64 = ((sec_range.1 - sec_range.0) * px_per_sec).max(0.0);
        let horizontal = add_margin(left_f64, width_f64, n_frames, margin_px);

        let hz_hi = hz_range.1.min(spec_hz_range.1);
        let hz_lo = hz_range.0.max(spec_hz_range.0).min(hz_hi);
        let top_f64 = freq_scale.hz_to_relative(hz_lo, spec_hz_range) as f64 * n_freqs as f64;
        let bottom_f64 = freq_scale.hz_to_relative(hz_hi, spec_hz_range) as f64 * n_freqs as f64;
        let vertical = add_margin(top_f64, bottom_f64 - top_f64, n_freqs, margin_px);

        Self {
            px_per_sec,
            left: horizontal.start,
            width: horizontal.length,
            top: vertical.start,
            height: vertical.length,
            left_margin: horizontal.pre_margin,
            right_margin: horizontal.post_margin,
            top_margin: vertical.pre_margin,
            bottom_margin: vertical.post_margin,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The region the viewport actually shows, inside the margin-widened band.
    pub fn source_rect(&self) -> SourceRect {
        SourceRect {
            left: self.left_margin,
            top: self.top_margin,
            width: (self.width as f64 - self.left_margin - self.right_margin).max(0.0),
            height: (self.height as f64 - self.top_margin - self.bottom_margin).max(0.0),
        }
    }
}
