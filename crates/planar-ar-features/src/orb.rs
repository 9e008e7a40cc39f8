//! ORB-style extractor: FAST-9 corners, intensity-centroid orientation and
//! 256 steered binary tests on a box-smoothed image.

use crate::fast;
use crate::smooth::box_blur;
use crate::{Descriptors, FeatureExtractor, Features, Keypoint};
use log::debug;
use planar_ar_core::GrayImageView;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Radius of the orientation disk; keypoint size is `2 * PATCH_RADIUS + 1`.
pub const PATCH_RADIUS: usize = 15;
/// Descriptor length in bytes (256 tests).
pub const DESCRIPTOR_BYTES: usize = 32;

const BLUR_RADIUS: usize = 2;
// Test points stay inside this radius so that, once rotated and smoothed,
// they never read past the orientation disk.
const TEST_RADIUS: i32 = (PATCH_RADIUS - BLUR_RADIUS) as i32;
const TEST_SIGMA: f64 = (2 * PATCH_RADIUS + 1) as f64 / 5.0;
/// Minimum keypoint distance from every image edge.
pub const EDGE_THRESHOLD: usize = PATCH_RADIUS + BLUR_RADIUS + 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    /// Keep at most this many of the strongest corners.
    pub max_features: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Seed of the binary test pattern. Descriptors are only comparable
    /// between extractors built with the same seed.
    pub pattern_seed: u64,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            max_features: 1000,
            fast_threshold: 20,
            pattern_seed: 0x0b5e_55ed,
        }
    }
}

/// Point pair `(x1, y1, x2, y2)` of one binary intensity test.
type TestPair = [i8; 4];

fn gaussian_offset(rng: &mut StdRng) -> (i32, i32) {
    loop {
        // Box-Muller
        let u1: f64 = 1.0 - rng.random::<f64>();
        let u2: f64 = rng.random::<f64>();
        let r = (-2.0 * u1.ln()).sqrt() * TEST_SIGMA;
        let theta = std::f64::consts::TAU * u2;
        let x = (r * theta.cos()).round() as i32;
        let y = (r * theta.sin()).round() as i32;
        if x * x + y * y <= TEST_RADIUS * TEST_RADIUS {
            return (x, y);
        }
    }
}

fn test_pattern(seed: u64) -> Vec<TestPair> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pattern = Vec::with_capacity(DESCRIPTOR_BYTES * 8);
    while pattern.len() < DESCRIPTOR_BYTES * 8 {
        let (x1, y1) = gaussian_offset(&mut rng);
        let (x2, y2) = gaussian_offset(&mut rng);
        if (x1, y1) == (x2, y2) {
            continue;
        }
        pattern.push([x1 as i8, y1 as i8, x2 as i8, y2 as i8]);
    }
    pattern
}

#[derive(Clone, Debug)]
pub struct OrbExtractor {
    params: OrbParams,
    pattern: Vec<TestPair>,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self::new(OrbParams::default())
    }
}

impl OrbExtractor {
    pub fn new(params: OrbParams) -> Self {
        let pattern = test_pattern(params.pattern_seed);
        Self { params, pattern }
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Intensity-centroid angle over the disk of radius `PATCH_RADIUS`.
    /// Caller guarantees the disk lies inside the image.
    fn orientation(&self, img: &GrayImageView<'_>, x: usize, y: usize) -> f32 {
        let r = PATCH_RADIUS as i64;
        let (mut m10, mut m01) = (0i64, 0i64);
        for dy in -r..=r {
            let row = (y as i64 + dy) as usize * img.width;
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let v = img.data[row + (x as i64 + dx) as usize] as i64;
                m10 += dx * v;
                m01 += dy * v;
            }
        }
        (m01 as f32).atan2(m10 as f32)
    }

    fn describe(
        &self,
        smoothed: &GrayImageView<'_>,
        x: usize,
        y: usize,
        angle: f32,
        out: &mut Vec<u8>,
    ) {
        let (s, c) = angle.sin_cos();
        let at = |dx: i8, dy: i8| {
            let (dx, dy) = (dx as f32, dy as f32);
            let rx = (c * dx - s * dy).round() as i64;
            let ry = (s * dx + c * dy).round() as i64;
            let idx = (y as i64 + ry) as usize * smoothed.width + (x as i64 + rx) as usize;
            smoothed.data[idx]
        };
        for tests in self.pattern.chunks_exact(8) {
            let mut byte = 0u8;
            for (bit, &[x1, y1, x2, y2]) in tests.iter().enumerate() {
                if at(x1, y1) < at(x2, y2) {
                    byte |= 1 << bit;
                }
            }
            out.push(byte);
        }
    }
}

impl FeatureExtractor for OrbExtractor {
    fn name(&self) -> &'static str {
        "orb"
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(w = image.width, h = image.height))
    )]
    fn extract(&self, image: &GrayImageView<'_>) -> Features {
        let mut corners = fast::detect(image, self.params.fast_threshold, EDGE_THRESHOLD);
        // Stable: equal scores keep raster order.
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));
        corners.truncate(self.params.max_features);

        if corners.is_empty() {
            debug!("orb: no corners in {}x{}", image.width, image.height);
            return Features {
                keypoints: Vec::new(),
                descriptors: Descriptors::empty_binary(DESCRIPTOR_BYTES),
            };
        }

        let smoothed = box_blur(image, BLUR_RADIUS);
        let smoothed = smoothed.view();
        let mut keypoints = Vec::with_capacity(corners.len());
        let mut data = Vec::with_capacity(corners.len() * DESCRIPTOR_BYTES);
        for corner in &corners {
            let angle = self.orientation(image, corner.x, corner.y);
            self.describe(&smoothed, corner.x, corner.y, angle, &mut data);
            keypoints.push(Keypoint {
                x: corner.x as f32,
                y: corner.y as f32,
                size: (2 * PATCH_RADIUS + 1) as f32,
                angle,
                response: corner.score,
                octave: 0,
            });
        }

        debug!(
            "orb: {} keypoints in {}x{}",
            keypoints.len(),
            image.width,
            image.height
        );
        Features {
            keypoints,
            descriptors: Descriptors::Binary {
                cols: DESCRIPTOR_BYTES,
                data,
            },
        }
    }

    fn is_scale_invariant(&self) -> bool {
        false
    }
}
