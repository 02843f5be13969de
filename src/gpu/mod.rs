//! GPU spectrogram rendering using wgpu.
//!
//! Mipmap slices are resampled in two separable passes into float
//! intermediates, then mapped through a palette into the caller's surface.

pub mod colormap;
pub mod compositor;
pub mod context;
pub mod governor;
pub mod layouts;
pub mod pipelines;
pub mod resample;
pub mod textures;

pub use colormap::{Colormap, ColormapError};
pub use compositor::{
    overlay_alpha, Compositor, CompositorError, OffscreenSurface, RenderOutcome, RenderRequest,
    SurfaceCompositor, SurfaceTarget,
};
pub use context::{GpuContext, GpuError};
pub use governor::{GovernorPermit, ResourceGovernor, DEFAULT_MAX_RESOURCE_SETS};
pub use resample::{plan_passes, PassPlan, QualityTier};
