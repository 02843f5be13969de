//! Benchmarks for level planning and CPU mipmap production.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spectro_view::mipmap::{build_pyramid, select_level, FreqScale, Mipmap, SliceArgs};

fn bench_select_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("Level Selection");
    let pyramid = build_pyramid(32768, 2048, 256);

    let windows = [(0.0, 600.0, "whole_track"), (100.0, 160.0, "minute"), (100.0, 101.0, "second")];
    for (start, end, name) in windows {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(start, end), |b, &range| {
            b.iter(|| {
                black_box(select_level(
                    &pyramid,
                    600.0,
                    range,
                    (0.0, 24000.0),
                    (0.0, 24000.0),
                    5,
                    FreqScale::Mel,
                    8192,
                ))
            });
        });
    }

    group.finish();
}

fn bench_slice_args(c: &mut Criterion) {
    c.bench_function("slice_args_mel", |b| {
        b.iter(|| {
            black_box(SliceArgs::new(
                black_box(16384),
                black_box(1024),
                600.0,
                (123.4, 167.8),
                (0.0, 24000.0),
                (80.0, 8000.0),
                5,
                FreqScale::Mel,
            ))
        });
    });
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Lanczos3 Resize");
    group.sample_size(10);

    let (width, height) = (4096u32, 1024u32);
    let samples = (0..width * height)
        .map(|i| ((i % 257) as f32 / 257.0))
        .collect();
    let full = Mipmap::new(width, height, samples).expect("valid mipmap");

    for (w, h) in [(2048u32, 1024u32), (1024, 512), (256, 256)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &(w, h),
            |b, &(w, h)| {
                b.iter(|| black_box(full.resized(w, h)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_select_level, bench_slice_args, bench_resize);
criterion_main!(benches);
