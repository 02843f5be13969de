//! Spectro View Core
//!
//! Multi-resolution spectrogram rendering for an interactive multi-track
//! audio viewer.
//!
//! # Features
//!
//! - Pyramid planning: pick the largest mipmap level whose slice fits the texture ceiling
//! - Sub-pixel slice geometry with anti-aliasing margins, linear or mel frequency axis
//! - Background mipmap production on a worker pool with stale-result rejection
//! - Two-pass separable GPU resampling via wgpu (bilinear preview, debounced Lanczos-3)
//! - Colormap lookup with waveform overlay darkening
//! - A ceiling on per-surface GPU resources across visible channels

pub mod config;
pub mod gpu;
pub mod mipmap;
pub mod view;
pub mod worker;

// Re-export commonly used types
pub use config::{ConfigError, ViewerConfig};
pub use gpu::{
    Colormap, Compositor, CompositorError, GpuContext, GpuError, OffscreenSurface, QualityTier,
    RenderOutcome, RenderRequest, ResourceGovernor, SurfaceCompositor,
};
pub use mipmap::{
    build_pyramid, select_level, ChannelKey, FreqScale, Mipmap, MipmapError, MipmapSource,
    MipmapStore, PlannedSlice, PyramidDescriptor, SliceArgs,
};
pub use view::{FrameDraw, SpectrogramViewer, ViewerError, ViewportRequest};
pub use worker::{CoordinatorError, CoordinatorEvent, RequestStatus, WorkerCoordinator};
