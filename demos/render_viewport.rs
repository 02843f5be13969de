//! Demo: render a synthetic spectrogram through a zoom sequence.
//!
//! Builds a chirp-like magnitude image, installs it in a viewer, zooms in
//! over a few viewport changes and writes the settled frame to a PNG.
//!
//! Run with:
//!     cargo run --example render_viewport --features tokio -- [config.json]

use std::time::{Duration, Instant};

use anyhow::Context;
use spectro_view::{
    ChannelKey, Colormap, GpuContext, Mipmap, SpectrogramViewer, ViewerConfig, ViewportRequest,
};

/// A rising tone over broadband noise, rows ascending in frequency.
fn synthetic_spectrogram(width: u32, height: u32) -> anyhow::Result<Mipmap> {
    let mut samples = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let tone_row = (x as f32 / width as f32) * height as f32 * 0.8;
            let distance = (y as f32 - tone_row).abs();
            let tone = (-distance * distance / 18.0).exp();
            let noise = ((x * 7919 + y * 104_729) % 97) as f32 / 97.0 * 0.15;
            samples.push((tone + noise).min(1.0));
        }
    }
    Ok(Mipmap::new(width, height, samples)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ViewerConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => ViewerConfig {
            pyramid_floor: 256,
            max_texture_size: 2048,
            ..Default::default()
        },
    };

    let ctx = GpuContext::new().await.context("creating GPU context")?;
    println!("GPU: {}", ctx.adapter_info().name);

    let mut viewer = SpectrogramViewer::new(config, ctx, &Colormap::default())?;
    let key = ChannelKey::new(0, 0);
    let track_sec = 120.0;
    let pyramid = viewer.set_spectrogram(
        key,
        synthetic_spectrogram(4096, 1024)?,
        track_sec,
        (0.0, 24000.0),
        Instant::now(),
    )?;
    println!("Pyramid: {} levels, smallest {:?}", pyramid.len(), pyramid.smallest());

    // Zoom from the whole track into ten seconds.
    for end_sec in [120.0, 60.0, 30.0, 10.0] {
        let request = ViewportRequest {
            channel: key,
            start_sec: 0.0,
            end_sec,
            hz_range: (0.0, 12000.0),
            device_pixel_ratio: 2.0,
            blend: 1.0,
            css_width: 640.0,
            css_height: 240.0,
        };
        viewer.set_viewport(request, Instant::now())?;
        for draw in viewer.frame(Instant::now()) {
            println!("  {:?}", draw);
        }
    }

    // Let the workers finish and the high-quality pass fire.
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        for draw in viewer.frame(Instant::now()) {
            println!("  {:?}", draw);
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    let channel = viewer.channel(key).context("channel view missing")?;
    let (width, height) = channel
        .surface()
        .map(|surface| surface.size())
        .context("nothing was drawn")?;
    let pixels = viewer
        .read_pixels(key)?
        .context("nothing was drawn")?;

    let output = "spectrogram_viewport.png";
    image::save_buffer(output, &pixels, width, height, image::ExtendedColorType::Rgba8)?;
    println!("Wrote {} ({}x{})", output, width, height);
    Ok(())
}
