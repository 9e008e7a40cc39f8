use nalgebra::Point2;
use planar_ar_core::{Homography, Pose};
use serde::{Deserialize, Serialize};

/// Stage counters for one `detect` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub query_keypoints: usize,
    pub correspondences: usize,
    pub rough_inliers: usize,
    pub refine_keypoints: usize,
    pub refine_correspondences: usize,
    pub refine_inliers: usize,
    /// The refinement pass succeeded and was composed into the homography.
    pub refined: bool,
}

/// Outcome of locating the pattern in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    pub found: bool,
    /// Pattern pixels -> frame pixels, normalised so `h[2][2] == 1`.
    pub homography: Homography,
    /// Pattern outline (`quad2d`) mapped through `homography`.
    pub projected_quad: [Point2<f32>; 4],
    /// Pattern plane -> camera frame. Only current when `found`.
    pub pose: Pose,
    pub stats: DetectionStats,
}

impl Default for TrackingResult {
    fn default() -> Self {
        Self {
            found: false,
            homography: Homography::identity(),
            projected_quad: [Point2::origin(); 4],
            pose: Pose::default(),
            stats: DetectionStats::default(),
        }
    }
}

impl TrackingResult {
    pub fn not_found(stats: DetectionStats) -> Self {
        Self {
            stats,
            ..Self::default()
        }
    }
}
