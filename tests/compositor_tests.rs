//! GPU integration tests for the resample/colormap compositor.
//!
//! Every test returns early when no adapter is available.

use std::sync::Arc;

use spectro_view::gpu::{
    Colormap, Compositor, GpuContext, OffscreenSurface, QualityTier, RenderOutcome,
    RenderRequest, ResourceGovernor,
};
use spectro_view::mipmap::{FreqScale, Mipmap, SliceArgs};

async fn create_gpu_context() -> Option<GpuContext> {
    GpuContext::new().await.ok()
}

fn compositor(ctx: &GpuContext, governor: Arc<ResourceGovernor>) -> Arc<Compositor> {
    Compositor::new(
        ctx,
        &Colormap::grayscale(),
        governor,
        wgpu::TextureFormat::Rgba8Unorm,
    )
}

/// Slice covering the whole mipmap at one frame per second.
fn full_slice(mipmap: &Mipmap) -> SliceArgs {
    let (w, h) = mipmap.size();
    SliceArgs::new(
        w as usize,
        h as usize,
        w as f64,
        (0.0, w as f64),
        (0.0, h as f32),
        (0.0, h as f32),
        0,
        FreqScale::Linear,
    )
}

fn pixel(pixels: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

#[tokio::test]
async fn test_zero_blend_draws_placeholder_box() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };
    let compositor = compositor(&ctx, ResourceGovernor::new(4));
    let mut surface_compositor = compositor.surface();
    let surface = OffscreenSurface::new(&ctx, 64, 32);

    let mipmap = Mipmap::new(16, 8, vec![1.0; 128]).unwrap();
    let request = RenderRequest {
        mipmap: &mipmap,
        slice: full_slice(&mipmap),
        dst_width: 40.0,
        dst_height: 20.0,
        blend: 0.0,
        quality: QualityTier::Lanczos3,
    };
    let outcome = surface_compositor.render(surface.target(), &request).unwrap();
    assert_eq!(outcome, RenderOutcome::Placeholder);
    // No resample work, so no resource set either.
    assert!(!surface_compositor.has_resources());

    let pixels = surface.read_pixels(&ctx).unwrap();
    assert_eq!(pixel(&pixels, 64, 0, 0)[3], 255);
    assert_eq!(pixel(&pixels, 64, 39, 19)[3], 255);
    assert_eq!(pixel(&pixels, 64, 40, 0), [0, 0, 0, 0]);
    assert_eq!(pixel(&pixels, 64, 0, 20), [0, 0, 0, 0]);
    assert_eq!(pixel(&pixels, 64, 63, 31), [0, 0, 0, 0]);
}

#[tokio::test]
async fn test_constant_mipmap_stays_constant() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };
    let compositor = compositor(&ctx, ResourceGovernor::new(4));
    let mipmap = Mipmap::new(200, 50, vec![0.5; 200 * 50]).unwrap();

    for quality in [QualityTier::Bilinear, QualityTier::Lanczos3] {
        let mut surface_compositor = compositor.surface();
        let surface = OffscreenSurface::new(&ctx, 70, 90);
        let request = RenderRequest {
            mipmap: &mipmap,
            slice: full_slice(&mipmap),
            dst_width: 70.0,
            dst_height: 90.0,
            blend: 1.0,
            quality,
        };
        let outcome = surface_compositor.render(surface.target(), &request).unwrap();
        assert_eq!(outcome, RenderOutcome::Drawn);

        let pixels = surface.read_pixels(&ctx).unwrap();
        for [r, g, b, a] in pixels.chunks_exact(4).map(|p| [p[0], p[1], p[2], p[3]]) {
            assert!((r as i32 - 128).abs() <= 1, "{:?}: r = {}", quality, r);
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 255);
        }
    }
}

#[tokio::test]
async fn test_high_frequencies_drawn_at_top() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };
    let compositor = compositor(&ctx, ResourceGovernor::new(4));
    let mut surface_compositor = compositor.surface();

    // Row 0 is the lowest frequency: dark low half, bright high half.
    let (w, h) = (32u32, 32u32);
    let samples = (0..w * h)
        .map(|i| if i / w >= h / 2 { 1.0 } else { 0.0 })
        .collect();
    let mipmap = Mipmap::new(w, h, samples).unwrap();
    let surface = OffscreenSurface::new(&ctx, 32, 64);
    let request = RenderRequest {
        mipmap: &mipmap,
        slice: full_slice(&mipmap),
        dst_width: 32.0,
        dst_height: 64.0,
        blend: 1.0,
        quality: QualityTier::Bilinear,
    };
    surface_compositor.render(surface.target(), &request).unwrap();

    let pixels = surface.read_pixels(&ctx).unwrap();
    assert!(pixel(&pixels, 32, 16, 2)[0] > 250);
    assert!(pixel(&pixels, 32, 16, 61)[0] < 5);
}

#[tokio::test]
async fn test_overlay_darkens_below_half_blend() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };
    let compositor = compositor(&ctx, ResourceGovernor::new(4));
    let mut surface_compositor = compositor.surface();
    let mipmap = Mipmap::new(8, 8, vec![1.0; 64]).unwrap();
    let surface = OffscreenSurface::new(&ctx, 8, 8);
    let request = RenderRequest {
        mipmap: &mipmap,
        slice: full_slice(&mipmap),
        dst_width: 8.0,
        dst_height: 8.0,
        blend: 0.25,
        quality: QualityTier::Bilinear,
    };
    surface_compositor.render(surface.target(), &request).unwrap();

    let pixels = surface.read_pixels(&ctx).unwrap();
    let [r, _, _, a] = pixel(&pixels, 8, 4, 4);
    assert!((r as i32 - 128).abs() <= 1, "r = {}", r);
    assert_eq!(a, 255);
}

#[tokio::test]
async fn test_governor_throttles_extra_surfaces() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };
    let governor = ResourceGovernor::new(1);
    let compositor = compositor(&ctx, Arc::clone(&governor));
    let mipmap = Mipmap::new(16, 16, vec![0.5; 256]).unwrap();
    let surface = OffscreenSurface::new(&ctx, 16, 16);
    let request = RenderRequest {
        mipmap: &mipmap,
        slice: full_slice(&mipmap),
        dst_width: 16.0,
        dst_height: 16.0,
        blend: 1.0,
        quality: QualityTier::Bilinear,
    };

    let mut first = compositor.surface();
    let mut second = compositor.surface();
    assert_eq!(first.render(surface.target(), &request).unwrap(), RenderOutcome::Drawn);
    assert_eq!(
        second.render(surface.target(), &request).unwrap(),
        RenderOutcome::Throttled
    );
    assert_eq!(governor.live(), 1);
    // A throttled surface must not keep showing the previous frame.
    let pixels = surface.read_pixels(&ctx).unwrap();
    assert!(pixels.iter().all(|&b| b == 0));

    drop(first);
    assert_eq!(governor.live(), 0);
    assert_eq!(second.render(surface.target(), &request).unwrap(), RenderOutcome::Drawn);
}

#[tokio::test]
async fn test_intermediates_follow_destination_size() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };
    let compositor = compositor(&ctx, ResourceGovernor::new(2));
    let mut surface_compositor = compositor.surface();
    let mipmap = Mipmap::new(64, 48, vec![0.2; 64 * 48]).unwrap();
    let surface = OffscreenSurface::new(&ctx, 100, 100);

    let mut request = RenderRequest {
        mipmap: &mipmap,
        slice: full_slice(&mipmap),
        dst_width: 100.0,
        dst_height: 40.0,
        blend: 1.0,
        quality: QualityTier::Bilinear,
    };
    surface_compositor.render(surface.target(), &request).unwrap();
    assert_eq!(
        surface_compositor.intermediate_sizes(),
        (Some((100, 48)), Some((100, 40)))
    );

    request.dst_width = 0.2;
    surface_compositor.render(surface.target(), &request).unwrap();
    assert_eq!(
        surface_compositor.intermediate_sizes(),
        (Some((1, 48)), Some((1, 40)))
    );
}
