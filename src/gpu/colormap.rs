//! 256-entry RGBA palettes uploaded as a 256x1 lookup texture.

use wgpu::{Device, Queue};

use super::textures::RenderTarget;

/// Number of palette entries.
pub const COLORMAP_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ColormapError {
    #[error("Colormap must be {expected} bytes (256 RGBA entries), got {got}")]
    WrongLength { expected: usize, got: usize },
}

/// A 256x1 RGBA8 lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colormap {
    rgba: Vec<u8>,
}

impl Colormap {
    pub fn from_rgba(rgba: Vec<u8>) -> Result<Self, ColormapError> {
        let expected = COLORMAP_LEN * 4;
        if rgba.len() != expected {
            return Err(ColormapError::WrongLength {
                expected,
                got: rgba.len(),
            });
        }
        Ok(Self { rgba })
    }

    /// Build a palette by evaluating `f` at 256 evenly spaced points in `[0, 1]`.
    pub fn from_fn(f: impl Fn(f32) -> [u8; 3]) -> Self {
        let rgba = (0..COLORMAP_LEN)
            .flat_map(|i| {
                let [r, g, b] = f(i as f32 / (COLORMAP_LEN - 1) as f32);
                [r, g, b, 255]
            })
            .collect();
        Self { rgba }
    }

    /// Black through purple and orange to pale yellow.
    pub fn inferno_like() -> Self {
        const STOPS: [(f32, [f32; 3]); 5] = [
            (0.0, [0.0, 0.0, 4.0]),
            (0.25, [87.0, 16.0, 110.0]),
            (0.5, [188.0, 55.0, 84.0]),
            (0.75, [249.0, 142.0, 9.0]),
            (1.0, [252.0, 255.0, 164.0]),
        ];
        Self::from_fn(|t| {
            let upper = STOPS
                .iter()
                .position(|&(stop, _)| stop >= t)
                .unwrap_or(STOPS.len() - 1)
                .max(1);
            let (t0, c0) = STOPS[upper - 1];
            let (t1, c1) = STOPS[upper];
            let f = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
            let lerp = |i: usize| (c0[i] + (c1[i] - c0[i]) * f).round() as u8;
            [lerp(0), lerp(1), lerp(2)]
        })
    }

    pub fn grayscale() -> Self {
        Self::from_fn(|t| {
            let v = (t * 255.0).round() as u8;
            [v, v, v]
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    /// RGBA of entry `index`.
    pub fn entry(&self, index: u8) -> [u8; 4] {
        let i = index as usize * 4;
        [
            self.rgba[i],
            self.rgba[i + 1],
            self.rgba[i + 2],
            self.rgba[i + 3],
        ]
    }

    /// Upload into a new 256x1 texture.
    pub fn upload(&self, device: &Device, queue: &Queue) -> RenderTarget {
        let target = RenderTarget::new(
            device,
            "colormap_texture",
            COLORMAP_LEN as u32,
            1,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(COLORMAP_LEN as u32 * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: COLORMAP_LEN as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        target
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Self::inferno_like()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_length_is_rejected() {
        assert!(matches!(
            Colormap::from_rgba(vec![0; 1000]),
            Err(ColormapError::WrongLength {
                expected: 1024,
                got: 1000
            })
        ));
        assert!(Colormap::from_rgba(vec![0; 1024]).is_ok());
    }

    #[test]
    fn test_default_ramp_endpoints() {
        let colormap = Colormap::default();
        assert_eq!(colormap.as_bytes().len(), 1024);
        assert_eq!(colormap.entry(0), [0, 0, 4, 255]);
        assert_eq!(colormap.entry(255), [252, 255, 164, 255]);
    }

    #[test]
    fn test_grayscale_is_monotonic() {
        let colormap = Colormap::grayscale();
        let reds: Vec<u8> = (0..=255u8).map(|i| colormap.entry(i)[0]).collect();
        assert!(reds.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reds[255], 255);
    }
}
