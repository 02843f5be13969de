//! Drawing state of one visible channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::debounce::Debouncer;
use crate::gpu::resample::destination_extent;
use crate::gpu::{
    Compositor, CompositorError, GpuContext, OffscreenSurface, QualityTier, RenderOutcome,
    RenderRequest, SurfaceCompositor,
};
use crate::mipmap::{ChannelKey, Mipmap, PlannedSlice, SliceArgs};

/// What must be visible on one channel's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRequest {
    pub channel: ChannelKey,
    pub start_sec: f64,
    pub end_sec: f64,
    pub hz_range: (f32, f32),
    pub device_pixel_ratio: f32,
    /// Spectrogram/waveform mix; `<= 0` hides the spectrogram.
    pub blend: f32,
    pub css_width: f32,
    pub css_height: f32,
}

impl ViewportRequest {
    /// Destination size in device pixels.
    pub fn destination_size(&self) -> (f32, f32) {
        let dpr = if self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        (self.css_width * dpr, self.css_height * dpr)
    }
}

/// One channel's surface, its latest plan and the mipmap it currently holds.
pub struct ChannelView {
    key: ChannelKey,
    compositor: SurfaceCompositor,
    surface: Option<OffscreenSurface>,
    viewport: Option<ViewportRequest>,
    plan: Option<PlannedSlice>,
    mipmap: Option<Arc<Mipmap>>,
    hq: Debouncer,
    last_outcome: Option<RenderOutcome>,
}

impl ChannelView {
    pub fn new(key: ChannelKey, compositor: &Arc<Compositor>, hq_delay: Duration) -> Self {
        Self {
            key,
            compositor: compositor.surface(),
            surface: None,
            viewport: None,
            plan: None,
            mipmap: None,
            hq: Debouncer::new(hq_delay),
            last_outcome: None,
        }
    }

    pub fn key(&self) -> ChannelKey {
        self.key
    }

    pub fn viewport(&self) -> Option<&ViewportRequest> {
        self.viewport.as_ref()
    }

    pub fn plan(&self) -> Option<&PlannedSlice> {
        self.plan.as_ref()
    }

    /// The mipmap most recently adopted for this channel.
    pub fn mipmap(&self) -> Option<&Arc<Mipmap>> {
        self.mipmap.as_ref()
    }

    pub fn last_outcome(&self) -> Option<RenderOutcome> {
        self.last_outcome
    }

    pub fn surface(&self) -> Option<&OffscreenSurface> {
        self.surface.as_ref()
    }

    pub fn has_gpu_resources(&self) -> bool {
        self.compositor.has_resources()
    }

    pub(crate) fn set_viewport(&mut self, viewport: ViewportRequest, plan: Option<PlannedSlice>) {
        self.viewport = Some(viewport);
        self.plan = plan;
    }

    pub(crate) fn adopt(&mut self, mipmap: Arc<Mipmap>) {
        self.mipmap = Some(mipmap);
    }

    pub(crate) fn forget_mipmap(&mut self) {
        self.mipmap = None;
        self.hq.cancel();
    }

    pub(crate) fn schedule_high_quality(&mut self, now: Instant) {
        self.hq.schedule(now);
    }

    pub fn high_quality_pending(&self) -> bool {
        self.hq.is_pending()
    }

    pub(crate) fn high_quality_due(&mut self, now: Instant) -> bool {
        self.hq.poll(now)
    }

    /// Draw the current viewport at `quality`.
    ///
    /// Returns `None` when there is no viewport yet, or when the planned
    /// level has not arrived and nothing older is held.
    pub(crate) fn render(
        &mut self,
        ctx: &GpuContext,
        quality: QualityTier,
        margin_px: usize,
        max_texture_size: usize,
    ) -> Result<Option<RenderOutcome>, CompositorError> {
        let Some(viewport) = self.viewport else {
            return Ok(None);
        };
        let (dst_width, dst_height) = viewport.destination_size();
        let size = (
            destination_extent(dst_width),
            destination_extent(dst_height),
        );
        let held = match (&self.plan, &self.mipmap) {
            (Some(plan), Some(mipmap)) => Some((
                Arc::clone(mipmap),
                slice_held_level(plan, &viewport, mipmap.size(), margin_px, max_texture_size),
            )),
            _ => None,
        };
        let target = ensure_surface(&mut self.surface, ctx, size).target();

        let outcome = match held {
            _ if viewport.blend <= 0.0 => {
                self.compositor.placeholder(target, dst_width, dst_height);
                RenderOutcome::Placeholder
            }
            _ if self.plan.is_none() => {
                self.compositor.clear(target);
                RenderOutcome::Cleared
            }
            Some((mipmap, HeldSlice::Slice(slice))) => {
                let request = RenderRequest {
                    mipmap: &mipmap,
                    slice,
                    dst_width,
                    dst_height,
                    blend: viewport.blend,
                    quality,
                };
                self.compositor.render(target, &request)?
            }
            Some((_, HeldSlice::OverCeiling)) => {
                log::debug!("Held level of {} too large for this viewport", self.key);
                self.compositor.clear(target);
                RenderOutcome::Cleared
            }
            None => return Ok(None),
        };
        log::trace!("{} rendered {:?} at {:?}", self.key, outcome, quality);
        self.last_outcome = Some(outcome);
        Ok(Some(outcome))
    }

    pub(crate) fn release(&mut self) {
        self.compositor.release();
        self.surface = None;
    }
}

/// How a held mipmap level serves the current plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum HeldSlice {
    Slice(SliceArgs),
    /// Re-slicing the held level for this viewport exceeds the texture ceiling.
    OverCeiling,
}

/// Slice of a held level of size `held` covering `viewport`.
///
/// When the held level differs from the planned one the slice is recomputed
/// for the held size, so the previous level keeps being shown until the
/// planned one arrives.
pub(crate) fn slice_held_level(
    plan: &PlannedSlice,
    viewport: &ViewportRequest,
    held: (u32, u32),
    margin_px: usize,
    max_texture_size: usize,
) -> HeldSlice {
    if held == plan.level {
        return HeldSlice::Slice(plan.args);
    }
    let args = SliceArgs::new(
        held.0 as usize,
        held.1 as usize,
        plan.track_sec,
        (viewport.start_sec, viewport.end_sec),
        plan.spec_hz_range,
        viewport.hz_range,
        margin_px,
        plan.freq_scale,
    );
    if args.width > max_texture_size || args.height > max_texture_size {
        return HeldSlice::OverCeiling;
    }
    HeldSlice::Slice(args)
}

fn ensure_surface<'a>(
    slot: &'a mut Option<OffscreenSurface>,
    ctx: &GpuContext,
    (width, height): (u32, u32),
) -> &'a OffscreenSurface {
    if slot.as_ref().map(OffscreenSurface::size) != Some((width, height)) {
        *slot = None;
    }
    slot.get_or_insert_with(|| OffscreenSurface::new(ctx, width, height))
}
