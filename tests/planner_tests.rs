//! Integration tests for pyramid planning and slice geometry.

use spectro_view::mipmap::{add_margin, build_pyramid, select_level, FreqScale, SliceArgs};

const SIZES: [u32; 9] = [1, 100, 255, 256, 300, 1000, 1023, 3000, 4096];
const FLOORS: [u32; 4] = [1, 64, 256, 1024];

#[test]
fn test_pyramid_monotonicity() {
    for &width in &SIZES {
        for &height in &SIZES {
            for &floor in &FLOORS {
                let pyramid = build_pyramid(width, height, floor);
                assert_eq!(pyramid.full(), (width, height));

                for row in pyramid.rows() {
                    assert!(
                        row.windows(2).all(|w| w[1].0 <= w[0].0),
                        "widths grew in {:?} ({}x{}, floor {})",
                        row,
                        width,
                        height,
                        floor
                    );
                    assert!(row.iter().all(|&(_, h)| h == row[0].1));
                }
                let heights: Vec<u32> = pyramid.rows().iter().map(|row| row[0].1).collect();
                assert!(heights.windows(2).all(|h| h[1] < h[0]));

                let (w, h) = pyramid.smallest();
                assert!(w.max(h) <= floor);
                assert_eq!((w, h), (width.min(floor), height.min(floor)));
            }
        }
    }
}

#[test]
fn test_slice_containment() {
    let pyramid = build_pyramid(4096, 1024, 256);
    let windows = [
        (0.0, 120.0),
        (0.0, 0.5),
        (119.0, 120.0),
        (37.3, 81.9),
        (-5.0, 10.0),
        (110.0, 130.0),
    ];
    let hz_ranges = [(0.0, 24000.0), (0.0, 100.0), (5000.0, 30000.0), (23999.0, 24000.0)];
    for (width, height) in pyramid.levels() {
        for &sec_range in &windows {
            for &hz_range in &hz_ranges {
                for scale in [FreqScale::Linear, FreqScale::Mel] {
                    let args = SliceArgs::new(
                        width as usize,
                        height as usize,
                        120.0,
                        sec_range,
                        (0.0, 24000.0),
                        hz_range,
                        5,
                        scale,
                    );
                    assert!(args.left + args.width <= width as usize, "{:?}", args);
                    assert!(args.top + args.height <= height as usize, "{:?}", args);
                    assert!(args.left_margin >= 0.0 && args.right_margin >= 0.0);
                    assert!(args.top_margin >= 0.0 && args.bottom_margin >= 0.0);
                }
            }
        }
    }
}

#[test]
fn test_margin_clamped_at_edges() {
    let at_start = add_margin(0.0, 100.0, 1000, 5);
    assert!(at_start.pre_margin < 5.0);
    assert_eq!(at_start.start, 0);

    let interior = add_margin(200.0, 100.0, 1000, 5);
    assert_eq!(interior.pre_margin, 5.0);
    assert_eq!(interior.post_margin, 5.0);

    let at_end = add_margin(950.0, 50.0, 1000, 5);
    assert!(at_end.post_margin < 5.0);
    assert_eq!(at_end.start + at_end.length, 1000);
}

#[test]
fn test_selection_respects_ceiling() {
    let pyramid = build_pyramid(4096, 1024, 256);
    for max in [256, 300, 512, 1000, 2048, 8192] {
        for sec_range in [(0.0, 120.0), (10.0, 20.0), (0.0, 1.0)] {
            if let Some(level) = select_level(
                &pyramid,
                120.0,
                sec_range,
                (0.0, 24000.0),
                (0.0, 24000.0),
                5,
                FreqScale::Linear,
                max,
            ) {
                assert!(level.args.width <= max);
                assert!(level.args.height <= max);
                assert!(pyramid.contains(level.size()));
            }
        }
    }
    assert!(select_level(
        &pyramid,
        120.0,
        (0.0, 120.0),
        (0.0, 24000.0),
        (0.0, 24000.0),
        5,
        FreqScale::Linear,
        100,
    )
    .is_none());
}

#[test]
fn test_zoomed_viewport_scenario() {
    let pyramid = build_pyramid(4096, 1024, 1024);
    let level = select_level(
        &pyramid,
        120.0,
        (10.0, 20.0),
        (0.0, 24000.0),
        (0.0, 12000.0),
        5,
        FreqScale::Linear,
        2048,
    )
    .expect("a level fits");

    assert!(level.args.width <= 2048 && level.args.height <= 2048);
    assert_eq!(level.size(), (4096, 1024));

    let px_per_sec = 4096.0 / 120.0;
    assert!((level.args.px_per_sec - px_per_sec).abs() < 1e-9);
    let visible = 10.0 * px_per_sec;
    let width = level.args.width as f64;
    assert!(width >= visible && width <= visible + 2.0 * 5.0 + 2.0);
    assert!((level.args.left_margin - 16.0 / 3.0).abs() < 1e-9);

    // Lower half of the frequency rows, bottom edge clamped.
    assert_eq!(level.args.top, 0);
    assert_eq!(level.args.height, 517);
}

#[test]
fn test_mel_expands_low_frequencies() {
    let linear = SliceArgs::new(
        100,
        1000,
        10.0,
        (0.0, 10.0),
        (0.0, 22050.0),
        (0.0, 1000.0),
        0,
        FreqScale::Linear,
    );
    let mel = SliceArgs::new(
        100,
        1000,
        10.0,
        (0.0, 10.0),
        (0.0, 22050.0),
        (0.0, 1000.0),
        0,
        FreqScale::Mel,
    );
    assert!(mel.height > linear.height);
}
