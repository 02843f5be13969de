//! Separable two-pass resampling of a magnitude slice.
//!
//! Pass 1 filters rows from the source band width to the destination width.
//! Pass 2 filters columns from the band height to the destination height and
//! flips rows so higher frequencies land at the top of the surface.

use serde::{Deserialize, Serialize};
use wgpu::{BindGroupLayout, Device, RenderPipeline, TextureFormat, TextureView};

use super::layouts::create_resample_layout;
use super::pipelines::{create_fullscreen_pipeline, create_pipeline_layout, create_shader};
use crate::mipmap::SliceArgs;

/// Resampling kernel quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// 2-tap tent filter, used while the viewport is moving.
    #[default]
    Bilinear,
    /// Windowed sinc with `a = 3`, used once interaction settles.
    Lanczos3,
}

impl QualityTier {
    fn fragment_entry(self) -> &'static str {
        match self {
            QualityTier::Bilinear => "fs_bilinear",
            QualityTier::Lanczos3 => "fs_lanczos3",
        }
    }
}

/// Uniform data for one resample pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ResampleUniforms {
    /// Fractional start of the visible region in input texels.
    pub src_offset: [f32; 2],
    /// Fractional size of the visible region in input texels.
    pub src_size: [f32; 2],
    /// Output target size in pixels.
    pub dst_size: [f32; 2],
    /// 0 filters along x, 1 along y.
    pub axis: u32,
    pub flip: u32,
}

/// Texture sizes and uniforms for both resample passes of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassPlan {
    /// Size of the uploaded source band (slice width x slice height).
    pub band: (u32, u32),
    /// Output of pass 1: destination width x band height.
    pub horizontal_target: (u32, u32),
    /// Output of pass 2: destination width x destination height.
    pub vertical_target: (u32, u32),
    pub horizontal: ResampleUniforms,
    pub vertical: ResampleUniforms,
}

/// Round a requested destination extent to whole texels.
///
/// Values below 0.5 (and NaN) clamp to 0.5 so the result is at least 1.
pub fn destination_extent(requested: f32) -> u32 {
    requested.max(0.5).round().max(1.0) as u32
}

/// Plan both passes for `slice` drawn at `dst_width x dst_height`.
///
/// Returns `None` when the slice has no visible area.
pub fn plan_passes(slice: &SliceArgs, dst_width: f32, dst_height: f32) -> Option<PassPlan> {
    if slice.is_empty() {
        return None;
    }
    let rect = slice.source_rect();
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return None;
    }
    let band = (slice.width as u32, slice.height as u32);
    let dst_w = destination_extent(dst_width);
    let dst_h = destination_extent(dst_height);

    let horizontal = ResampleUniforms {
        src_offset: [rect.left as f32, 0.0],
        src_size: [rect.width as f32, band.1 as f32],
        dst_size: [dst_w as f32, band.1 as f32],
        axis: 0,
        flip: 0,
    };
    let vertical = ResampleUniforms {
        src_offset: [0.0, rect.top as f32],
        src_size: [dst_w as f32, rect.height as f32],
        dst_size: [dst_w as f32, dst_h as f32],
        axis: 1,
        flip: 1,
    };
    Some(PassPlan {
        band,
        horizontal_target: (dst_w, band.1),
        vertical_target: (dst_w, dst_h),
        horizontal,
        vertical,
    })
}

/// Resample pipelines for both quality tiers.
///
/// One program per tier serves both directions through the `axis` uniform.
pub struct ResamplePrograms {
    layout: BindGroupLayout,
    bilinear: RenderPipeline,
    lanczos3: RenderPipeline,
}

impl ResamplePrograms {
    pub fn new(device: &Device) -> Self {
        let shader = create_shader(
            device,
            "resample_shader",
            include_str!("shaders/resample.wgsl"),
        );
        let layout = create_resample_layout(device);
        let pipeline_layout = create_pipeline_layout(device, "resample_pipeline_layout", &[&layout]);
        let build = |tier: QualityTier, label: &'static str| {
            create_fullscreen_pipeline(
                device,
                label,
                &pipeline_layout,
                &shader,
                tier.fragment_entry(),
                TextureFormat::R32Float,
            )
        };
        Self {
            bilinear: build(QualityTier::Bilinear, "resample_bilinear_pipeline"),
            lanczos3: build(QualityTier::Lanczos3, "resample_lanczos3_pipeline"),
            layout,
        }
    }

    pub fn pipeline(&self, tier: QualityTier) -> &RenderPipeline {
        match tier {
            QualityTier::Bilinear => &self.bilinear,
            QualityTier::Lanczos3 => &self.lanczos3,
        }
    }

    /// Record one resample pass reading `input` into `output`.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &Device,
        encoder: &mut wgpu::CommandEncoder,
        tier: QualityTier,
        uniforms: &wgpu::Buffer,
        input: &TextureView,
        output: &TextureView,
        label: &'static str,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(input),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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
        });
        pass.set_pipeline(self.pipeline(tier));
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
