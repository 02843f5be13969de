//! Viewer orchestration: viewport changes in, colormapped surfaces out.
//!
//! Per viewport change the viewer plans a level from the store, asks the
//! worker pool for it, draws the bilinear preview from whatever level is
//! held, and schedules a Lanczos-3 redraw. Each frame it adopts finished
//! mipmaps and fires the redraws whose debounce has expired.

pub mod channel;
pub mod debounce;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub use channel::{ChannelView, ViewportRequest};
pub use debounce::Debouncer;

use crate::config::{ConfigError, ViewerConfig};
use crate::gpu::{
    Colormap, Compositor, CompositorError, GpuContext, GpuError, QualityTier, RenderOutcome,
    ResourceGovernor,
};
use crate::mipmap::{ChannelKey, Mipmap, MipmapError, MipmapSource, MipmapStore, PyramidDescriptor};
use crate::worker::{CoordinatorError, CoordinatorEvent, WorkerCoordinator};

/// Errors surfaced by [`SpectrogramViewer`].
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Compositor error: {0}")]
    Compositor(#[from] CompositorError),
    #[error("Worker error: {0}")]
    Coordinator(#[from] CoordinatorError),
    #[error("Mipmap error: {0}")]
    Mipmap(#[from] MipmapError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// A draw performed during [`SpectrogramViewer::set_viewport`] or [`SpectrogramViewer::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDraw {
    pub key: ChannelKey,
    pub quality: QualityTier,
    pub outcome: RenderOutcome,
}

/// Owns the store, worker pool, GPU compositor and per-channel views.
pub struct SpectrogramViewer {
    config: ViewerConfig,
    store: Arc<MipmapStore>,
    coordinator: WorkerCoordinator,
    ctx: GpuContext,
    compositor: Arc<Compositor>,
    channels: HashMap<ChannelKey, ChannelView>,
}

impl SpectrogramViewer {
    /// Build a viewer drawing into RGBA8 surfaces.
    ///
    /// Surfaces count against the process-wide governor, so every viewer in
    /// the process shares one ceiling.
    pub fn new(config: ViewerConfig, ctx: GpuContext, colormap: &Colormap) -> Result<Self, ViewerError> {
        let governor = ResourceGovernor::global_with_max(config.max_resource_sets);
        Self::with_governor(config, ctx, colormap, governor)
    }

    pub fn with_governor(
        config: ViewerConfig,
        ctx: GpuContext,
        colormap: &Colormap,
        governor: Arc<ResourceGovernor>,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        let store = Arc::new(MipmapStore::new(config.pyramid_floor));
        let source: Arc<dyn MipmapSource> = Arc::clone(&store) as Arc<dyn MipmapSource>;
        let coordinator = WorkerCoordinator::init(config.to_coordinator_config(), source)?;
        let compositor = Compositor::new(
            &ctx,
            colormap,
            governor,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        Ok(Self {
            config,
            store,
            coordinator,
            ctx,
            compositor,
            channels: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MipmapStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &WorkerCoordinator {
        &self.coordinator
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        self.compositor.governor()
    }

    pub fn channel(&self, key: ChannelKey) -> Option<&ChannelView> {
        self.channels.get(&key)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Install a freshly computed spectrogram and re-plan the channel if it is visible.
    pub fn set_spectrogram(
        &mut self,
        key: ChannelKey,
        full: Mipmap,
        track_sec: f64,
        spec_hz_range: (f32, f32),
        now: Instant,
    ) -> Result<PyramidDescriptor, ViewerError> {
        let pyramid = self
            .store
            .set_spectrogram(key, full, track_sec, spec_hz_range)?;
        // Sizes adopted for the previous spectrogram no longer describe this one.
        self.coordinator.forget(key);
        let Some(view) = self.channels.get_mut(&key) else {
            return Ok(pyramid);
        };
        view.forget_mipmap();
        let viewport = view.viewport().copied();
        self.coordinator.register_surface(key);
        if let Some(viewport) = viewport {
            self.set_viewport(viewport, now)?;
        }
        Ok(pyramid)
    }

    /// Apply a viewport change for one channel.
    ///
    /// Draws a bilinear preview immediately when a mipmap is held and
    /// schedules the Lanczos-3 redraw.
    pub fn set_viewport(
        &mut self,
        request: ViewportRequest,
        now: Instant,
    ) -> Result<Option<FrameDraw>, ViewerError> {
        let key = request.channel;
        if !self.channels.contains_key(&key) {
            let view = ChannelView::new(key, &self.compositor, self.config.hq_debounce());
            self.channels.insert(key, view);
            let replayed = self.coordinator.register_surface(key);
            self.adopt_events(replayed);
        }

        let plan = self.store.get_pyramid_and_slice(
            key,
            (request.start_sec, request.end_sec),
            request.hz_range,
            self.config.margin_px,
            self.config.freq_scale,
            self.config.max_texture_size,
        );
        if plan.is_none() {
            log::debug!("No drawable level for {}", key);
        }
        if let Some(plan) = &plan {
            let (width, height) = plan.level;
            let status = self.coordinator.request_mipmap(key, width, height)?;
            log::trace!("Request {}x{} for {}: {:?}", width, height, key, status);
        }

        let Some(view) = self.channels.get_mut(&key) else {
            return Ok(None);
        };
        view.set_viewport(request, plan);
        view.schedule_high_quality(now);
        let outcome = view.render(
            &self.ctx,
            QualityTier::Bilinear,
            self.config.margin_px,
            self.config.max_texture_size,
        )?;
        Ok(outcome.map(|outcome| FrameDraw {
            key,
            quality: QualityTier::Bilinear,
            outcome,
        }))
    }

    /// Adopt finished mipmaps and run due high-quality redraws.
    ///
    /// A failing surface is logged and skipped; the other surfaces still draw.
    pub fn frame(&mut self, now: Instant) -> Vec<FrameDraw> {
        let events = self.coordinator.poll();
        let adopted = self.adopt_events(events);

        let mut draws = Vec::new();
        for key in adopted {
            // Once interaction has settled a late arrival goes straight to final quality.
            let settled = self
                .channels
                .get(&key)
                .is_some_and(|view| !view.high_quality_pending());
            let quality = if settled {
                QualityTier::Lanczos3
            } else {
                QualityTier::Bilinear
            };
            self.draw(key, quality, &mut draws);
        }
        let due: Vec<ChannelKey> = self
            .channels
            .iter_mut()
            .filter_map(|(&key, view)| view.high_quality_due(now).then_some(key))
            .collect();
        for key in due {
            self.draw(key, QualityTier::Lanczos3, &mut draws);
        }
        draws
    }

    fn draw(&mut self, key: ChannelKey, quality: QualityTier, draws: &mut Vec<FrameDraw>) {
        let Some(view) = self.channels.get_mut(&key) else {
            return;
        };
        match view.render(
            &self.ctx,
            quality,
            self.config.margin_px,
            self.config.max_texture_size,
        ) {
            Ok(Some(outcome)) => draws.push(FrameDraw {
                key,
                quality,
                outcome,
            }),
            Ok(None) => {}
            Err(err) => log::error!("Failed to draw spectrogram {}: {}", key, err),
        }
    }

    /// Hand ready mipmaps to their views; returns the channels that changed.
    fn adopt_events(&mut self, events: Vec<CoordinatorEvent>) -> Vec<ChannelKey> {
        let mut adopted = Vec::new();
        for event in events {
            match event {
                CoordinatorEvent::MipmapReady { key, mipmap } => {
                    if let Some(view) = self.channels.get_mut(&key) {
                        view.adopt(mipmap);
                        if !adopted.contains(&key) {
                            adopted.push(key);
                        }
                    }
                }
                CoordinatorEvent::Unavailable { key, width, height } => {
                    log::warn!("Mipmap {}x{} unavailable for {}", width, height, key);
                }
            }
        }
        adopted
    }

    /// Stop drawing `key` and drop everything held for it.
    pub fn remove_channel(&mut self, key: ChannelKey) {
        if let Some(mut view) = self.channels.remove(&key) {
            view.release();
        }
        self.coordinator.forget(key);
        self.store.remove(key);
        if self.channels.is_empty() && self.store.is_empty() {
            if let Err(err) = self.reset() {
                log::error!("Failed to reset worker pool: {}", err);
            }
        }
    }

    /// Drop every channel and restart the worker pool.
    pub fn reset(&mut self) -> Result<(), ViewerError> {
        for view in self.channels.values_mut() {
            view.release();
        }
        self.channels.clear();
        self.store.clear();
        self.coordinator.reset()?;
        log::info!("Spectrogram viewer reset");
        Ok(())
    }

    /// Pixels of `key`'s surface as tightly packed RGBA8 rows.
    pub fn read_pixels(&self, key: ChannelKey) -> Result<Option<Vec<u8>>, ViewerError> {
        let Some(surface) = self.channels.get(&key).and_then(ChannelView::surface) else {
            return Ok(None);
        };
        Ok(Some(surface.read_pixels(&self.ctx)?))
    }
}
