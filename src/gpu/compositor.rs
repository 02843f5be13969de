//! Spectrogram compositor: resample a mipmap slice and colormap it into a surface.
//!
//! A [`Compositor`] holds what every surface can share: the compiled
//! programs, the palette texture and the resource governor. Each drawing
//! surface owns a [`SurfaceCompositor`], which lazily takes a governor permit
//! and allocates its intermediate targets on first draw.
//!
//! Frame layout:
//! 1. Upload the slice band of the mipmap into a transient `R32Float` texture
//! 2. Horizontal resample into a `dst_w x band_h` intermediate
//! 3. Vertical resample (with frequency flip) into a `dst_w x dst_h` intermediate
//! 4. Colormap with overlay darkening into the target

use std::sync::Arc;

use wgpu::{BindGroupLayout, Buffer, Device, Queue, RenderPipeline, TextureFormat, TextureView};

use super::colormap::Colormap;
use super::context::GpuContext;
use super::governor::{GovernorPermit, ResourceGovernor};
use super::layouts::create_colormap_layout;
use super::pipelines::{create_pipeline_layout, create_shader, RenderPipelineBuilder};
use super::resample::{plan_passes, PassPlan, QualityTier, ResamplePrograms, ResampleUniforms};
use super::textures::{ReadbackBuffer, ReadbackError, RenderTarget};
use crate::mipmap::{Mipmap, SliceArgs};

/// Errors that abort one surface's frame.
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("{pass} target {width}x{height} exceeds device limit {max}")]
    TargetTooLarge {
        pass: &'static str,
        width: u32,
        height: u32,
        max: u32,
    },
    #[error("Readback failed: {0}")]
    Readback(#[from] ReadbackError),
}

/// Uniform data for the colormap pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ColormapUniforms {
    overlay_alpha: f32,
    _padding: [f32; 3],
}

/// Darkening applied toward black as the blend favours the waveform.
///
/// `1 - 2 * blend` below 0.5, never negative, and zero from 0.5 upward.
pub fn overlay_alpha(blend: f32) -> f32 {
    if blend < 0.5 {
        (1.0 - 2.0 * blend).max(0.0)
    } else {
        0.0
    }
}

/// A view to draw into, with its pixel size.
#[derive(Clone, Copy)]
pub struct SurfaceTarget<'a> {
    pub view: &'a TextureView,
    pub width: u32,
    pub height: u32,
}

/// One draw of one channel.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub mipmap: &'a Mipmap,
    pub slice: SliceArgs,
    /// Destination size in device pixels.
    pub dst_width: f32,
    pub dst_height: f32,
    pub blend: f32,
    pub quality: QualityTier,
}

/// What a call to [`SurfaceCompositor::render`] ended up drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Resampled and colormapped spectrogram.
    Drawn,
    /// `blend <= 0`: transparent with an opaque placeholder box.
    Placeholder,
    /// Nothing visible in the slice; the surface was cleared.
    Cleared,
    /// The governor had no free slot; the surface was cleared.
    Throttled,
}

/// Programs and palette shared by every surface of one viewer.
pub struct Compositor {
    device: Arc<Device>,
    queue: Arc<Queue>,
    resample: ResamplePrograms,
    colormap_layout: BindGroupLayout,
    colormap_pipeline: RenderPipeline,
    placeholder_pipeline: RenderPipeline,
    palette: RenderTarget,
    governor: Arc<ResourceGovernor>,
    format: TextureFormat,
}

impl Compositor {
    /// Compile the programs and upload `colormap`.
    ///
    /// `format` is the format of the surfaces this compositor will draw into.
    pub fn new(
        ctx: &GpuContext,
        colormap: &Colormap,
        governor: Arc<ResourceGovernor>,
        format: TextureFormat,
    ) -> Arc<Self> {
        let device = &ctx.device;
        let resample = ResamplePrograms::new(device);

        let shader = create_shader(
            device,
            "colormap_shader",
            include_str!("shaders/colormap.wgsl"),
        );
        let colormap_layout = create_colormap_layout(device);
        let colormap_pipeline_layout =
            create_pipeline_layout(device, "colormap_pipeline_layout", &[&colormap_layout]);
        let colormap_pipeline =
            RenderPipelineBuilder::new("colormap_pipeline", &colormap_pipeline_layout, &shader)
                .fragment_entry("fs_colormap")
                .format(format)
                .build(device);

        let placeholder_pipeline_layout =
            create_pipeline_layout(device, "placeholder_pipeline_layout", &[]);
        let placeholder_pipeline = RenderPipelineBuilder::new(
            "placeholder_pipeline",
            &placeholder_pipeline_layout,
            &shader,
        )
        .fragment_entry("fs_placeholder")
        .format(format)
        .build(device);

        let palette = colormap.upload(device, &ctx.queue);

        Arc::new(Self {
            device: Arc::clone(&ctx.device),
            queue: Arc::clone(&ctx.queue),
            resample,
            colormap_layout,
            colormap_pipeline,
            placeholder_pipeline,
            palette,
            governor,
            format,
        })
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        &self.governor
    }

    /// A compositor for one drawing surface. Allocates nothing until first draw.
    pub fn surface(self: &Arc<Self>) -> SurfaceCompositor {
        SurfaceCompositor {
            shared: Arc::clone(self),
            resources: None,
        }
    }

    fn check_limit(&self, pass: &'static str, (width, height): (u32, u32)) -> Result<(), CompositorError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            log::error!("{} target {}x{} exceeds device limit {}", pass, width, height, max);
            return Err(CompositorError::TargetTooLarge {
                pass,
                width,
                height,
                max,
            });
        }
        Ok(())
    }
}

/// Per-surface GPU state, held only while a governor permit is.
struct ResourceSet {
    _permit: GovernorPermit,
    horizontal_uniforms: Buffer,
    vertical_uniforms: Buffer,
    colormap_uniforms: Buffer,
    horizontal: Option<RenderTarget>,
    vertical: Option<RenderTarget>,
}

impl ResourceSet {
    fn new(device: &Device, permit: GovernorPermit) -> Self {
        let uniform_buffer = |label: &'static str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let resample_size = std::mem::size_of::<ResampleUniforms>();
        Self {
            _permit: permit,
            horizontal_uniforms: uniform_buffer("horizontal_resample_uniforms", resample_size),
            vertical_uniforms: uniform_buffer("vertical_resample_uniforms", resample_size),
            colormap_uniforms: uniform_buffer(
                "colormap_uniforms",
                std::mem::size_of::<ColormapUniforms>(),
            ),
            horizontal: None,
            vertical: None,
        }
    }
}

/// Reallocate `slot` only when the requested size differs from what it holds.
fn ensure_intermediate<'a>(
    device: &Device,
    slot: &'a mut Option<RenderTarget>,
    label: &str,
    (width, height): (u32, u32),
) -> &'a RenderTarget {
    if slot.as_ref().map(RenderTarget::size) != Some((width, height)) {
        *slot = None;
    }
    slot.get_or_insert_with(|| {
        log::trace!("Allocating {} {}x{}", label, width, height);
        RenderTarget::intermediate(device, label, width, height)
    })
}

/// Draws one channel's spectrogram into one surface.
pub struct SurfaceCompositor {
    shared: Arc<Compositor>,
    resources: Option<ResourceSet>,
}

impl SurfaceCompositor {
    /// Whether this surface currently holds a governor slot.
    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    /// Sizes of the two intermediate targets, if allocated.
    pub fn intermediate_sizes(&self) -> (Option<(u32, u32)>, Option<(u32, u32)>) {
        match &self.resources {
            Some(set) => (
                set.horizontal.as_ref().map(RenderTarget::size),
                set.vertical.as_ref().map(RenderTarget::size),
            ),
            None => (None, None),
        }
    }

    /// Drop the resource set and give its slot back to the governor.
    pub fn release(&mut self) {
        if self.resources.take().is_some() {
            log::debug!("Released spectrogram surface resources");
        }
    }

    fn acquire(&mut self) -> bool {
        if self.resources.is_none() {
            let Some(permit) = self.shared.governor.acquire() else {
                return false;
            };
            log::debug!(
                "Created spectrogram surface resources ({}/{})",
                self.shared.governor.live(),
                self.shared.governor.max()
            );
            self.resources = Some(ResourceSet::new(&self.shared.device, permit));
        }
        true
    }

    /// Draw `request` into `target`.
    pub fn render(
        &mut self,
        target: SurfaceTarget<'_>,
        request: &RenderRequest<'_>,
    ) -> Result<RenderOutcome, CompositorError> {
        if request.blend <= 0.0 {
            self.placeholder(target, request.dst_width, request.dst_height);
            return Ok(RenderOutcome::Placeholder);
        }

        let Some(plan) = plan_passes(&request.slice, request.dst_width, request.dst_height) else {
            log::debug!("Empty slice, clearing surface");
            self.clear(target);
            return Ok(RenderOutcome::Cleared);
        };
        let slice = &request.slice;
        let mipmap = request.mipmap;
        if slice.left + slice.width > mipmap.width() as usize
            || slice.top + slice.height > mipmap.height() as usize
        {
            log::debug!(
                "Slice {}+{} x {}+{} outside {}x{} mipmap, skipping",
                slice.left,
                slice.width,
                slice.top,
                slice.height,
                mipmap.width(),
                mipmap.height()
            );
            self.clear(target);
            return Ok(RenderOutcome::Cleared);
        }

        let shared = &self.shared;
        shared.check_limit("source", plan.band)?;
        shared.check_limit("horizontal", plan.horizontal_target)?;
        shared.check_limit("vertical", plan.vertical_target)?;

        if !self.acquire() {
            log::debug!("Resource governor at capacity, surface not drawn");
            self.clear(target);
            return Ok(RenderOutcome::Throttled);
        }

        self.draw_spectrogram(target, request, &plan);
        Ok(RenderOutcome::Drawn)
    }

    fn draw_spectrogram(&mut self, target: SurfaceTarget<'_>, request: &RenderRequest<'_>, plan: &PassPlan) {
        let shared = Arc::clone(&self.shared);
        let Some(set) = self.resources.as_mut() else {
            return;
        };
        let device = &shared.device;
        let queue = &shared.queue;

        // Transient source band; dropped at the end of the frame.
        let source = RenderTarget::source(device, "spectrogram_source", plan.band.0, plan.band.1);
        upload_band(queue, &source, request.mipmap, &request.slice);

        queue.write_buffer(&set.horizontal_uniforms, 0, bytemuck::bytes_of(&plan.horizontal));
        queue.write_buffer(&set.vertical_uniforms, 0, bytemuck::bytes_of(&plan.vertical));
        let colormap_uniforms = ColormapUniforms {
            overlay_alpha: overlay_alpha(request.blend),
            _padding: [0.0; 3],
        };
        queue.write_buffer(&set.colormap_uniforms, 0, bytemuck::bytes_of(&colormap_uniforms));

        let horizontal = ensure_intermediate(
            device,
            &mut set.horizontal,
            "horizontal_intermediate",
            plan.horizontal_target,
        );
        let vertical = ensure_intermediate(
            device,
            &mut set.vertical,
            "vertical_intermediate",
            plan.vertical_target,
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("spectrogram_encoder"),
        });

        shared.resample.encode(
            device,
            &mut encoder,
            request.quality,
            &set.horizontal_uniforms,
            source.view(),
            horizontal.view(),
            "horizontal_resample_pass",
        );
        shared.resample.encode(
            device,
            &mut encoder,
            request.quality,
            &set.vertical_uniforms,
            horizontal.view(),
            vertical.view(),
            "vertical_resample_pass",
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("colormap_bind_group"),
            layout: &shared.colormap_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: set.colormap_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(vertical.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(shared.palette.view()),
                },
            ],
        });

        {
            let mut pass = begin_target_pass(&mut encoder, target.view, "colormap_pass");
            let (w, h) = plan.vertical_target;
            pass.set_scissor_rect(0, 0, w.min(target.width), h.min(target.height));
            pass.set_pipeline(&shared.colormap_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Clear `target` and paint an opaque `dst_width x dst_height` box when both are positive.
    ///
    /// Marks a channel whose spectrogram is hidden by the blend.
    pub fn placeholder(&self, target: SurfaceTarget<'_>, dst_width: f32, dst_height: f32) {
        let device = &self.shared.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("placeholder_encoder"),
        });
        {
            let mut pass = begin_target_pass(&mut encoder, target.view, "placeholder_pass");
            if dst_width > 0.0 && dst_height > 0.0 {
                let w = super::resample::destination_extent(dst_width).min(target.width);
                let h = super::resample::destination_extent(dst_height).min(target.height);
                if w > 0 && h > 0 {
                    pass.set_scissor_rect(0, 0, w, h);
                    pass.set_pipeline(&self.shared.placeholder_pipeline);
                    pass.draw(0..3, 0..1);
                }
            }
        }
        self.shared.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Clear `target` to transparent.
    pub fn clear(&self, target: SurfaceTarget<'_>) {
        let mut encoder = self
            .shared
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("clear_encoder"),
            });
        drop(begin_target_pass(&mut encoder, target.view, "clear_pass"));
        self.shared.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn begin_target_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &TextureView,
    label: &'static str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

/// Copy rows `top..top + height`, columns `left..left + width` of `mipmap`.
fn upload_band(queue: &Queue, source: &RenderTarget, mipmap: &Mipmap, slice: &SliceArgs) {
    let row_bytes = mipmap.width() * 4;
    let offset = (slice.top * mipmap.width() as usize + slice.left) as u64 * 4;
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: source.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(mipmap.samples()),
        wgpu::TexelCopyBufferLayout {
            offset,
            bytes_per_row: Some(row_bytes),
            rows_per_image: Some(slice.height as u32),
        },
        wgpu::Extent3d {
            width: slice.width as u32,
            height: slice.height as u32,
            depth_or_array_layers: 1,
        },
    );
}

/// An RGBA8 render target with CPU readback, for headless use.
pub struct OffscreenSurface {
    target: RenderTarget,
    readback: ReadbackBuffer,
}

impl OffscreenSurface {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        Self {
            target: RenderTarget::for_output(
                &ctx.device,
                "offscreen_surface",
                width.max(1),
                height.max(1),
                TextureFormat::Rgba8Unorm,
            ),
            readback: ReadbackBuffer::new(&ctx.device, width.max(1), height.max(1)),
        }
    }

    pub fn target(&self) -> SurfaceTarget<'_> {
        let (width, height) = self.target.size();
        SurfaceTarget {
            view: self.target.view(),
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    /// Copy the surface to the CPU as tightly packed RGBA8 rows.
    pub fn read_pixels(&self, ctx: &GpuContext) -> Result<Vec<u8>, CompositorError> {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen_readback_encoder"),
            });
        self.readback.copy_from(&mut encoder, self.target.texture());
        ctx.queue.submit(std::iter::once(encoder.finish()));
        Ok(self.readback.read_pixels(&ctx.device)?)
    }
}
