use super::{DetectError, DetectionStats, DetectorParams, MatchPolicy, PatternError, TrackingResult};
use crate::{PatternModel, RansacHomographyEstimator, RobustHomographyEstimator};
use log::{debug, info, warn};
use nalgebra::Point2;
use planar_ar_core::{
    homography_from_4pt, pose_from_homography, to_gray, warp_perspective_gray, CameraModel,
    FrameView, GrayImageView, Homography, ImageError, Pose,
};
use planar_ar_features::{
    ratio_test, BruteForceMatcher, Correspondence, DescriptorMatcher, FeatureExtractor,
    OrbExtractor,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Counters and model produced by one extract / match / fit pass.
#[derive(Default)]
struct PassOutcome {
    keypoints: usize,
    correspondences: usize,
    inliers: usize,
    homography: Option<Homography>,
}

/// Locates one trained planar pattern per frame.
///
/// The extractor, matcher and robust fitter are trait objects, so any
/// conforming implementation can be swapped in via
/// [`PatternDetector::with_components`].
pub struct PatternDetector {
    camera: CameraModel,
    params: DetectorParams,
    extractor: Box<dyn FeatureExtractor>,
    matcher: Box<dyn DescriptorMatcher>,
    estimator: Box<dyn RobustHomographyEstimator>,
    pattern: Option<PatternModel>,
}

impl std::fmt::Debug for PatternDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternDetector")
            .field("camera", &self.camera)
            .field("params", &self.params)
            .field("extractor", &self.extractor.name())
            .field("pattern_keypoints", &self.pattern.as_ref().map(PatternModel::len))
            .finish()
    }
}

impl PatternDetector {
    /// ORB extraction, brute-force matching and RANSAC fitting, all
    /// configured from `params`.
    pub fn new(camera: CameraModel, params: DetectorParams) -> Self {
        let extractor = Box::new(OrbExtractor::new(params.orb.clone()));
        let matcher = Box::new(BruteForceMatcher::new(params.matcher.clone()));
        let estimator = Box::new(RansacHomographyEstimator::new(params.ransac.clone()));
        Self::with_components(camera, params, extractor, matcher, estimator)
    }

    pub fn with_components(
        camera: CameraModel,
        params: DetectorParams,
        extractor: Box<dyn FeatureExtractor>,
        matcher: Box<dyn DescriptorMatcher>,
        estimator: Box<dyn RobustHomographyEstimator>,
    ) -> Self {
        Self {
            camera,
            params,
            extractor,
            matcher,
            estimator,
            pattern: None,
        }
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// The active pattern, if `train` has been called.
    pub fn pattern(&self) -> Option<&PatternModel> {
        self.pattern.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.pattern.is_some()
    }

    /// Build a pattern from a reference frame with this detector's extractor
    /// and pyramid settings. Does not train.
    pub fn build_pattern(&self, frame: &FrameView<'_>) -> Result<PatternModel, PatternError> {
        let gray = to_gray(frame)?;
        crate::build_pattern(&gray.view(), self.extractor.as_ref(), &self.params.pyramid)
    }

    /// Make `pattern` the active target, replacing any earlier one.
    ///
    /// A pattern without keypoints is still installed, so later `detect`
    /// calls report `found = false`, but the call returns
    /// [`PatternError::EmptyPattern`].
    pub fn train(&mut self, pattern: PatternModel) -> Result<(), PatternError> {
        if pattern.keypoints.len() != pattern.descriptors.rows() {
            return Err(PatternError::Misaligned {
                keypoints: pattern.keypoints.len(),
                rows: pattern.descriptors.rows(),
            });
        }

        self.matcher.clear();
        self.matcher.train(&pattern.descriptors);
        let empty = pattern.is_empty();
        let (w, h) = pattern.size();
        let n = pattern.len();
        self.pattern = Some(pattern);

        if empty {
            warn!("detector: trained on a {w}x{h} pattern with no keypoints");
            return Err(PatternError::EmptyPattern);
        }
        info!("detector: trained on {w}x{h} pattern, {n} keypoints");
        Ok(())
    }

    /// Locate the pattern in a 1, 3 or 4 channel frame.
    pub fn detect(&self, frame: &FrameView<'_>) -> Result<TrackingResult, DetectError> {
        if self.pattern.is_none() {
            return Err(DetectError::NotTrained);
        }
        let gray = to_gray(frame)?;
        self.detect_gray(&gray.view())
    }

    /// Locate the pattern in a grayscale frame.
    ///
    /// Returns `Err` only for contract violations (untrained detector,
    /// invalid camera, malformed buffer). A pattern that is not visible yields
    /// `Ok` with `found == false`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(w = image.width, h = image.height))
    )]
    pub fn detect_gray(&self, image: &GrayImageView<'_>) -> Result<TrackingResult, DetectError> {
        let pattern = self.pattern.as_ref().ok_or(DetectError::NotTrained)?;
        if !self.camera.is_valid() {
            return Err(DetectError::InvalidCamera);
        }
        check_view(image)?;

        let mut stats = DetectionStats::default();
        if pattern.is_empty() {
            debug!("detect: pattern has no keypoints");
            return Ok(TrackingResult::not_found(stats));
        }

        let rough_pass = self.match_and_fit(pattern, image);
        stats.query_keypoints = rough_pass.keypoints;
        stats.correspondences = rough_pass.correspondences;
        stats.rough_inliers = rough_pass.inliers;
        let Some(rough) = rough_pass.homography else {
            debug!(
                "detect: no rough fit ({} keypoints, {} correspondences, {} inliers)",
                stats.query_keypoints, stats.correspondences, stats.rough_inliers
            );
            return Ok(TrackingResult::not_found(stats));
        };

        let homography = if self.params.refine_homography {
            self.refine(pattern, image, rough, &mut stats)
        } else {
            rough.normalized().unwrap_or(rough)
        };

        let projected_quad = homography.apply_all(&pattern.quad2d);
        if projected_quad.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            debug!("detect: projected outline is not finite");
            return Ok(TrackingResult::not_found(stats));
        }

        let Some(pose) = self.estimate_pose(pattern, &projected_quad) else {
            warn!("detect: homography found but pose decomposition failed");
            return Ok(TrackingResult::not_found(stats));
        };

        debug!(
            "detect: found, {} rough inliers, refined={}",
            stats.rough_inliers, stats.refined
        );
        Ok(TrackingResult {
            found: true,
            homography,
            projected_quad,
            pose,
            stats,
        })
    }

    /// Second pass on the frame warped back into pattern space. Falls back to
    /// `rough` when the pass does not produce a usable fit.
    fn refine(
        &self,
        pattern: &PatternModel,
        image: &GrayImageView<'_>,
        rough: Homography,
        stats: &mut DetectionStats,
    ) -> Homography {
        let warped = warp_perspective_gray(image, rough, pattern.width(), pattern.height());
        let pass = self.match_and_fit(pattern, &warped.view());
        stats.refine_keypoints = pass.keypoints;
        stats.refine_correspondences = pass.correspondences;
        stats.refine_inliers = pass.inliers;

        let composed = pass
            .homography
            .and_then(|refinement| (rough * refinement).normalized());
        match composed {
            Some(h) => {
                stats.refined = true;
                h
            }
            None => {
                warn!(
                    "detect: refinement failed ({} correspondences, {} inliers), keeping rough homography",
                    pass.correspondences, pass.inliers
                );
                rough.normalized().unwrap_or(rough)
            }
        }
    }

    /// Extract, match against the trained pattern and fit pattern -> image.
    fn match_and_fit(&self, pattern: &PatternModel, image: &GrayImageView<'_>) -> PassOutcome {
        let mut out = PassOutcome::default();
        let features = self.extractor.extract(image);
        out.keypoints = features.keypoints.len();
        if features.is_empty() {
            return out;
        }
        if features.keypoints.len() != features.descriptors.rows() {
            warn!(
                "detect: extractor returned {} keypoints but {} descriptor rows",
                features.keypoints.len(),
                features.descriptors.rows()
            );
            return out;
        }

        let correspondences: Vec<Correspondence> = match self.params.match_policy {
            MatchPolicy::Nearest => self.matcher.match_nearest(&features.descriptors),
            MatchPolicy::RatioTest { max_ratio } => {
                ratio_test(&self.matcher.knn_match(&features.descriptors, 2), max_ratio)
            }
        };

        let (src, dst): (Vec<Point2<f32>>, Vec<Point2<f32>>) = correspondences
            .iter()
            .filter_map(|c| {
                let train = pattern.keypoints.get(c.train_idx)?;
                let query = features.keypoints.get(c.query_idx)?;
                Some((train.pt(), query.pt()))
            })
            .unzip();
        out.correspondences = src.len();
        if src.len() < self.params.min_matches {
            return out;
        }

        let Some(fit) = self.estimator.estimate(&src, &dst) else {
            return out;
        };
        out.inliers = fit.inlier_count();
        if out.inliers <= self.params.min_matches {
            return out;
        }
        out.homography = Some(fit.homography);
        out
    }

    /// Pattern -> camera pose from the projected outline.
    fn estimate_pose(&self, pattern: &PatternModel, corners: &[Point2<f32>; 4]) -> Option<Pose> {
        let mut image_pts = [Point2::origin(); 4];
        for (dst, c) in image_pts.iter_mut().zip(corners) {
            let p = self
                .camera
                .undistort_pixel(Point2::new(c.x as f64, c.y as f64))?;
            *dst = Point2::new(p.x as f32, p.y as f32);
        }
        let plane_pts = pattern.quad3d.map(|p| Point2::new(p.x as f32, p.y as f32));
        let h = homography_from_4pt(&plane_pts, &image_pts)?;
        pose_from_homography(&self.camera.intrinsic_matrix(), &h.h)
    }
}

fn check_view(image: &GrayImageView<'_>) -> Result<(), ImageError> {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    if image.data.len() != width * height {
        return Err(ImageError::InvalidBuffer {
            expected: width * height,
            got: image.data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_ar_core::GrayImage;

    fn detector() -> PatternDetector {
        PatternDetector::new(CameraModel::default(), DetectorParams::default())
    }

    #[test]
    fn untrained_detect_is_an_error() {
        let img = GrayImage::new(32, 32);
        let det = detector();
        assert!(!det.is_trained());
        assert_eq!(det.detect_gray(&img.view()), Err(DetectError::NotTrained));
        let frame = FrameView::from(img.view());
        assert_eq!(det.detect(&frame), Err(DetectError::NotTrained));
    }

    #[test]
    fn empty_pattern_reports_not_found() {
        let mut det = detector();
        let blank = GrayImage::from_raw(80, 60, vec![77; 80 * 60]).unwrap();
        let pattern = det.build_pattern(&FrameView::from(blank.view())).unwrap();
        assert!(pattern.is_empty());
        assert_eq!(det.train(pattern), Err(PatternError::EmptyPattern));
        assert!(det.is_trained());

        let res = det.detect_gray(&blank.view()).unwrap();
        assert!(!res.found);
    }

    #[test]
    fn zero_focal_length_is_a_contract_error() {
        let camera = CameraModel {
            fx: 0.0,
            ..CameraModel::default()
        };
        let mut det = PatternDetector::new(camera, DetectorParams::default());
        let blank = GrayImage::new(40, 40);
        let _ = det.train(det.build_pattern(&FrameView::from(blank.view())).unwrap());
        assert_eq!(det.detect_gray(&blank.view()), Err(DetectError::InvalidCamera));
    }

    #[test]
    fn malformed_gray_buffer_is_rejected() {
        let mut det = detector();
        let blank = GrayImage::new(40, 40);
        let _ = det.train(det.build_pattern(&FrameView::from(blank.view())).unwrap());

        let data = vec![0u8; 10];
        let bad = GrayImageView {
            width: 5,
            height: 5,
            data: &data,
        };
        assert_eq!(
            det.detect_gray(&bad),
            Err(DetectError::Image(ImageError::InvalidBuffer {
                expected: 25,
                got: 10
            }))
        );
    }

    #[test]
    fn unsupported_channel_count_is_rejected() {
        let data = vec![0u8; 2 * 4 * 4];
        assert_eq!(
            FrameView::new(4, 4, 2, &data).err(),
            Some(ImageError::UnsupportedChannels { channels: 2 })
        );
    }
}
