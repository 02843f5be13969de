//! Bind group layout builders for GPU pipelines.
//!
//! Every spectrogram pass reads its inputs with `textureLoad`, so the layouts
//! only need unfilterable float textures and no samplers.

use wgpu::{BindGroupLayout, BindGroupLayoutEntry, Device, ShaderStages};

/// Builder for creating bind group layouts with common patterns.
pub struct BindGroupLayoutBuilder {
    label: Option<&'static str>,
    entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutBuilder {
    /// Create a new bind group layout builder.
    pub fn new(label: &'static str) -> Self {
        Self {
            label: Some(label),
            entries: Vec::new(),
        }
    }

    /// Add a uniform buffer entry.
    pub fn uniform(mut self, binding: u32, visibility: ShaderStages) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self
    }

    /// Add a 2D float texture entry.
    ///
    /// `R32Float` is not filterable without an extra device feature, so
    /// magnitude textures are declared unfilterable and read texel by texel.
    pub fn texture_2d(mut self, binding: u32, visibility: ShaderStages, filterable: bool) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    /// Build the bind group layout.
    pub fn build(self, device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: self.label,
            entries: &self.entries,
        })
    }
}

/// Resample pass layout (uniforms, magnitude texture).
pub fn create_resample_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("resample_bind_group_layout")
        .uniform(0, ShaderStages::FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT, false)
        .build(device)
}

/// Colormap pass layout (uniforms, magnitude texture, palette LUT).
pub fn create_colormap_layout(device: &Device) -> BindGroupLayout {
    BindGroupLayoutBuilder::new("colormap_bind_group_layout")
        .uniform(0, ShaderStages::FRAGMENT)
        .texture_2d(1, ShaderStages::FRAGMENT, false)
        .texture_2d(2, ShaderStages::FRAGMENT, true)
        .build(device)
}
