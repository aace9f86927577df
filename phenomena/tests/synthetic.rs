//! End-to-end detection tests over synthetic spectral frames.

use std::sync::Arc;

use ndarray::Array2;
use phenomena::{
    Dispersion, FixedBorders, FlareKind, FrameHeader, PhenomenaDetector, Wavelen,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const WIDTH: usize = 300;
const HEIGHT: usize = 80;
const LINE_CENTER: f64 = 40.0;
const CONTINUUM: f32 = 200.0;
const LINE_CORE: f32 = 80.0;

/// Dispersion of 0.15 A/px puts the half-angstrom wing window at 3 px.
fn detector() -> PhenomenaDetector {
    PhenomenaDetector::new(
        Dispersion::of_angstroms_per_pixel(0.15),
        Wavelen::of_angstroms(6562.8),
        WIDTH,
        Arc::new(FixedBorders {
            left: 10,
            right: 290,
        }),
    )
}

fn header(frame_count: usize) -> FrameHeader {
    FrameHeader {
        frame_count,
        trimmed: false,
    }
}

/// A frame with a flat continuum, an absorption line at `LINE_CENTER` and
/// deterministic per-frame noise.
fn quiet_frame(seed: u64) -> Array2<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((HEIGHT, WIDTH), |(y, _)| {
        let base = if (y as f64 - LINE_CENTER).abs() <= 3.0 {
            LINE_CORE
        } else {
            CONTINUUM
        };
        base + rng.gen_range(-2.0f32..2.0f32)
    })
}

/// Carve a dark lane into one column, `half_width` rows on each side of the
/// line center. The surrounding continuum stops the wing scans.
fn carve_lane(frame: &mut Array2<f32>, column: usize, half_width: usize, value: f32) {
    let center = LINE_CENTER as usize;
    for y in center - half_width..=center + half_width {
        frame[[y, column]] = value;
    }
}

/// Dim and flatten a block of columns into a sunspot-like signature.
fn carve_active_region(frame: &mut Array2<f32>, columns: std::ops::RangeInclusive<usize>) {
    for x in columns {
        for y in 0..HEIGHT {
            frame[[y, x]] = if (y as f64 - LINE_CENTER).abs() <= 3.0 {
                100.0
            } else {
                170.0
            };
        }
    }
}

#[test]
fn test_full_capture_detection() {
    let _ = env_logger::builder().is_test(true).try_init();

    let frame_count = 30;
    let detector = detector();
    let header = header(frame_count);

    for frame_id in 0..frame_count {
        let mut frame = quiet_frame(frame_id as u64);
        if (8..=19).contains(&frame_id) {
            carve_active_region(&mut frame, 60..=74);
        }
        match frame_id {
            // Two nearby events of different strength, one weak distant one
            5 => carve_lane(&mut frame, 200, 7, 100.0),
            6 => carve_lane(&mut frame, 202, 9, 100.0),
            10 => carve_lane(&mut frame, 100, 6, 100.0),
            _ => {}
        }
        detector
            .process_frame(frame_id, WIDTH, HEIGHT, &frame.view(), &|_| LINE_CENTER, &header)
            .unwrap();
    }

    // Raw redshifts land under their frame ids, in reconstructed coordinates
    assert!(detector.has_redshifts());
    let redshifts = detector.redshifts();
    let frame5 = &redshifts[&5];
    assert_eq!(frame5.len(), 1);
    assert_eq!(frame5[0].column, WIDTH - 200 - 1);
    assert_eq!(frame5[0].pixel_shift, 7);
    assert_eq!(redshifts[&6][0].pixel_shift, 9);
    assert_eq!(redshifts[&10][0].pixel_shift, 6);

    // The frame-5 and frame-6 events cluster; the stronger one wins
    let areas = detector.max_redshift_areas(10);
    assert_eq!(areas.len(), 2);
    assert_eq!(areas[0].pixel_shift, 9);
    assert_eq!(areas[0].id.as_deref(), Some("A"));
    assert_eq!(areas[0].centroid_x, (WIDTH - 202 - 1) as i32);
    assert_eq!(areas[1].pixel_shift, 6);
    assert_eq!(areas[1].id.as_deref(), Some("B"));
    assert_eq!(areas[1].centroid_x, (WIDTH - 100 - 1) as i32);

    // The dimmed block flood-fills into a single active region
    assert!(detector.has_active_regions());
    let regions = detector.active_regions();
    assert_eq!(regions.len(), 1);
    let region = &regions.regions()[0];
    assert_eq!(region.top_left().x as usize, 60);
    assert_eq!(region.bottom_right().x as usize, 74);
    assert_eq!(region.top_left().y as usize, 8);
    assert_eq!(region.bottom_right().y as usize, 19);

    // Borders were recorded for every frame
    let borders = detector.border_detection().unwrap();
    assert!(borders.left().iter().all(|&l| l == 10));
    assert!(borders.right().iter().all(|&r| r == 290));

    // Nothing in this capture looks like a flare
    assert!(detector.flares().is_empty());
}

#[test]
fn test_doppler_velocity_query() {
    let detector = detector();
    let expected = 299_792.458 * 7.0 * 0.15 / 6562.8;
    assert!((detector.speed_of(7) - expected).abs() < 1e-9);
}

#[test]
fn test_disabled_capture_accumulates_nothing() {
    let mut detector = detector();
    detector.set_detect_redshifts(false);
    detector.set_detect_active_regions(false);
    detector.set_detect_flares(false);

    let mut frame = quiet_frame(0);
    carve_lane(&mut frame, 200, 9, 100.0);
    detector
        .process_frame(0, WIDTH, HEIGHT, &frame.view(), &|_| LINE_CENTER, &header(1))
        .unwrap();

    assert!(!detector.has_redshifts());
    assert!(!detector.has_active_regions());
    // Border recording still ran
    assert_eq!(detector.border_detection().unwrap().left()[0], 10);
}

#[test]
fn test_ellerman_bomb_detection() {
    let detector = detector();
    let header = header(3);

    for frame_id in 0..3 {
        let mut frame = quiet_frame(100 + frame_id as u64);
        if frame_id == 1 {
            // A bright wing blob just below 1 A from the line center,
            // spanning a few columns; the line core stays quiet
            for x in 146..=154 {
                frame[[44, x]] = 250.0;
                frame[[45, x]] = 300.0;
                frame[[46, x]] = 350.0;
                frame[[47, x]] = 420.0;
                frame[[48, x]] = 500.0;
                frame[[49, x]] = 500.0;
            }
        }
        detector
            .process_frame(frame_id, WIDTH, HEIGHT, &frame.view(), &|_| LINE_CENTER, &header)
            .unwrap();
    }

    let flares = detector.flares();
    assert!(!flares.is_empty());
    assert!(flares.flares().len() <= 2);
    for flare in flares.flares() {
        assert_eq!(flare.kind, FlareKind::EllermanBomb);
        assert_eq!(flare.frame_id, 1);
        // Blurring spreads the blob one column past its seeded span
        assert!((145..=155).contains(&flare.column));
    }
    // Strongest first
    let scores: Vec<f64> = flares.flares().iter().map(|f| f.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}
