//! Robust homography fitting.

use log::debug;
use nalgebra::Point2;
use planar_ar_core::{
    estimate_homography, homography_from_4pt, ransac, Estimator, Homography, RansacOptions,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A fitted homography with one inlier flag per input pair.
#[derive(Clone, Debug, PartialEq)]
pub struct HomographyFit {
    /// Maps `src` points onto `dst` points.
    pub homography: Homography,
    pub inliers: Vec<bool>,
}

impl HomographyFit {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&b| b).count()
    }
}

/// Outlier-tolerant homography fitting from index-paired points.
pub trait RobustHomographyEstimator: Send + Sync {
    /// Fewest pairs `estimate` will attempt a fit with.
    fn min_points(&self) -> usize;

    /// Fit `dst ~ H * src`. `None` when there are too few pairs, the lengths
    /// differ, or no model gathers enough support.
    fn estimate(&self, src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<HomographyFit>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Inlier threshold on forward reprojection error, in pixels.
    pub reproj_threshold: f64,
    /// Refuse to fit below this many pairs.
    pub min_points: usize,
    /// The best model must explain strictly more than this fraction of
    /// pairs.
    pub min_inlier_ratio: f64,
    pub max_iters: usize,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 3.0,
            min_points: 8,
            min_inlier_ratio: 0.5,
            max_iters: 2000,
            confidence: 0.995,
            seed: 0x5eed_ca11,
        }
    }
}

type Pair = (Point2<f32>, Point2<f32>);

// Twice the triangle area below which three sample points count as collinear.
const MIN_AREA2: f32 = 1.0;

fn collinear(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> bool {
    let ab = b - a;
    let ac = c - a;
    (ab.x * ac.y - ab.y * ac.x).abs() < MIN_AREA2
}

fn any_three_collinear(pts: &[Point2<f32>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES
        .iter()
        .any(|&[i, j, k]| collinear(pts[i], pts[j], pts[k]))
}

struct HomographyModel;

impl Estimator for HomographyModel {
    type Datum = Pair;
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Pair], sample: &[usize]) -> Option<Homography> {
        let src: [Point2<f32>; 4] = std::array::from_fn(|k| data[sample[k]].0);
        let dst: [Point2<f32>; 4] = std::array::from_fn(|k| data[sample[k]].1);
        homography_from_4pt(&src, &dst)
    }

    fn residual(h: &Homography, (src, dst): &Pair) -> f64 {
        let p = h.apply_f64(Point2::new(src.x as f64, src.y as f64));
        let r = (p.x - dst.x as f64).hypot(p.y - dst.y as f64);
        if r.is_finite() {
            r
        } else {
            f64::INFINITY
        }
    }

    fn is_degenerate(data: &[Pair], sample: &[usize]) -> bool {
        let src: [Point2<f32>; 4] = std::array::from_fn(|k| data[sample[k]].0);
        let dst: [Point2<f32>; 4] = std::array::from_fn(|k| data[sample[k]].1);
        any_three_collinear(&src) || any_three_collinear(&dst)
    }

    fn refit(data: &[Pair], inliers: &[usize]) -> Option<Homography> {
        let src: Vec<Point2<f32>> = inliers.iter().map(|&i| data[i].0).collect();
        let dst: Vec<Point2<f32>> = inliers.iter().map(|&i| data[i].1).collect();
        estimate_homography(&src, &dst)
    }
}

/// Seeded RANSAC over exact 4-point fits, refit by normalised DLT on the
/// consensus set.
#[derive(Clone, Debug, Default)]
pub struct RansacHomographyEstimator {
    params: RansacParams,
}

impl RansacHomographyEstimator {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RansacParams {
        &self.params
    }
}

impl RobustHomographyEstimator for RansacHomographyEstimator {
    fn min_points(&self) -> usize {
        self.params.min_points.max(HomographyModel::MIN_SAMPLES)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, src, dst), fields(pairs = src.len()))
    )]
    fn estimate(&self, src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<HomographyFit> {
        if src.len() != dst.len() || src.len() < self.min_points() {
            debug!(
                "ransac: refusing {} / {} pairs (need {})",
                src.len(),
                dst.len(),
                self.min_points()
            );
            return None;
        }

        let n = src.len();
        let required = ((self.params.min_inlier_ratio * n as f64).floor() as usize + 1)
            .max(HomographyModel::MIN_SAMPLES);
        let data: Vec<Pair> = src.iter().copied().zip(dst.iter().copied()).collect();
        let opts = RansacOptions {
            max_iters: self.params.max_iters,
            thresh: self.params.reproj_threshold,
            min_inliers: required,
            confidence: self.params.confidence,
            seed: self.params.seed,
            refit_on_inliers: true,
        };

        let res = ransac::<HomographyModel>(&data, &opts);
        let homography = match res.model {
            Some(h) if res.success => h,
            _ => {
                debug!("ransac: no consensus of {required}/{n} after {} iters", res.iters);
                return None;
            }
        };

        let mut inliers = vec![false; n];
        for &i in &res.inliers {
            inliers[i] = true;
        }
        debug!(
            "ransac: {}/{} inliers, rms {:.3}px, {} iters",
            res.inliers.len(),
            n,
            res.inlier_rms,
            res.iters
        );
        Some(HomographyFit {
            homography,
            inliers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truth() -> Homography {
        Homography::from_array([
            [0.9, -0.12, 40.0],
            [0.1, 1.05, 25.0],
            [1e-4, -5e-5, 1.0],
        ])
    }

    fn grid(n: usize) -> Vec<Point2<f32>> {
        (0..n)
            .map(|i| Point2::new((i % 6) as f32 * 37.0 + 5.0, (i / 6) as f32 * 29.0 + 3.0))
            .collect()
    }

    #[test]
    fn refuses_seven_pairs() {
        let src = grid(7);
        let dst: Vec<_> = src.iter().map(|&p| truth().apply(p)).collect();
        let est = RansacHomographyEstimator::default();
        assert!(est.estimate(&src, &dst).is_none());
    }

    #[test]
    fn refuses_mismatched_lengths() {
        let src = grid(12);
        let dst = grid(11);
        assert!(RansacHomographyEstimator::default()
            .estimate(&src, &dst)
            .is_none());
    }

    #[test]
    fn recovers_homography_and_flags_outliers() {
        let src = grid(30);
        let mut dst: Vec<_> = src.iter().map(|&p| truth().apply(p)).collect();
        let outliers = [2usize, 9, 17, 23, 28];
        for (k, &i) in outliers.iter().enumerate() {
            dst[i].x += 40.0 + 13.0 * k as f32;
            dst[i].y -= 25.0 + 7.0 * k as f32;
        }

        let fit = RansacHomographyEstimator::default()
            .estimate(&src, &dst)
            .expect("fit");
        for (i, &inlier) in fit.inliers.iter().enumerate() {
            assert_eq!(inlier, !outliers.contains(&i), "pair {i}");
        }
        assert_eq!(fit.inlier_count(), 25);
        for &p in &src {
            let a = fit.homography.apply(p);
            let b = truth().apply(p);
            assert!((a - b).norm() < 1e-2, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn fails_without_majority_support() {
        let src = grid(20);
        let mut dst: Vec<_> = src.iter().map(|&p| truth().apply(p)).collect();
        // Scramble 11 of 20 targets, leaving 9 well-spread inliers.
        for i in (0..20).filter(|i| i % 2 == 0 || *i == 1) {
            dst[i] = Point2::new(500.0 - 31.0 * i as f32, 17.0 * (i * i % 11) as f32);
        }
        assert!(RansacHomographyEstimator::default()
            .estimate(&src, &dst)
            .is_none());

        let lenient = RansacHomographyEstimator::new(RansacParams {
            min_inlier_ratio: 0.3,
            ..RansacParams::default()
        });
        let fit = lenient.estimate(&src, &dst).expect("fit");
        assert!(fit.inlier_count() >= 8);
    }

    #[test]
    fn exactly_half_support_is_not_a_majority() {
        let src = grid(20);
        let mut dst: Vec<_> = src.iter().map(|&p| truth().apply(p)).collect();
        for i in (0..20).step_by(2) {
            dst[i] = Point2::new(500.0 - 31.0 * i as f32, 17.0 * (i * i % 11) as f32);
        }
        assert!(RansacHomographyEstimator::default()
            .estimate(&src, &dst)
            .is_none());

        // One more correct pair tips it over.
        dst[0] = truth().apply(src[0]);
        let fit = RansacHomographyEstimator::default()
            .estimate(&src, &dst)
            .expect("fit");
        assert_eq!(fit.inlier_count(), 11);
    }

    #[test]
    fn collinear_input_is_rejected() {
        let src: Vec<_> = (0..10).map(|i| Point2::new(i as f32 * 10.0, 5.0)).collect();
        let dst: Vec<_> = (0..10).map(|i| Point2::new(i as f32 * 10.0, 9.0)).collect();
        assert!(RansacHomographyEstimator::default()
            .estimate(&src, &dst)
            .is_none());
    }

    #[test]
    fn same_seed_same_fit() {
        let src = grid(24);
        let mut dst: Vec<_> = src.iter().map(|&p| truth().apply(p)).collect();
        dst[3].x += 50.0;
        dst[11].y += 80.0;
        let est = RansacHomographyEstimator::default();
        let a = est.estimate(&src, &dst).expect("a");
        let b = est.estimate(&src, &dst).expect("b");
        assert_eq!(a, b);
    }
}
