use criterion::{black_box, criterion_group, criterion_main, Criterion};
use planar_ar::core::{warp_perspective_gray, GrayImage, Homography};
use planar_ar::features::{FeatureExtractor, OrbExtractor};
use planar_ar::{CameraModel, DetectorParams, FrameView, PatternDetector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn textured(width: usize, height: usize, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::from_raw(width, height, vec![128; width * height]).expect("canvas");
    for _ in 0..140 {
        let w = rng.random_range(8..40usize);
        let h = rng.random_range(8..40usize);
        let x0 = rng.random_range(0..width - w);
        let y0 = rng.random_range(0..height - h);
        let v: u8 = rng.random();
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.set(x, y, v);
            }
        }
    }
    img
}

fn bench_detect(c: &mut Criterion) {
    let pattern = textured(320, 240, 1);
    let h = Homography::from_array([[0.97, 0.06, 75.0], [-0.04, 1.01, 55.0], [4e-5, -2e-5, 1.0]]);
    let frame = warp_perspective_gray(
        &pattern.view(),
        h.inverse().expect("invertible"),
        640,
        480,
    );

    c.bench_function("orb_extract_640x480", |b| {
        let orb = OrbExtractor::default();
        b.iter(|| black_box(orb.extract(black_box(&frame.view()))))
    });

    for refine in [false, true] {
        let params = DetectorParams {
            refine_homography: refine,
            ..DetectorParams::default()
        };
        let mut det = PatternDetector::new(CameraModel::default(), params);
        let model = det
            .build_pattern(&FrameView::from(pattern.view()))
            .expect("pattern");
        det.train(model).expect("train");

        let name = if refine {
            "detect_640x480_refined"
        } else {
            "detect_640x480_rough"
        };
        c.bench_function(name, |b| {
            b.iter(|| black_box(det.detect_gray(black_box(&frame.view()))))
        });
    }
}

criterion_group!(benches, bench_detect);
criterion_main!(benches);
