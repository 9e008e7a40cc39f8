use crate::RansacParams;
use planar_ar_features::{MatcherParams, OrbParams};
use serde::{Deserialize, Serialize};

/// How query descriptors are turned into correspondences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Two nearest neighbours per query; keep the nearest when
    /// `best / second < max_ratio`.
    RatioTest { max_ratio: f32 },
    /// Single nearest neighbour, accepted as is (the matcher's cross-check,
    /// when enabled, provides the filtering).
    #[default]
    Nearest,
}

impl MatchPolicy {
    /// Ratio test with the usual 0.75 threshold.
    pub fn ratio_test() -> Self {
        MatchPolicy::RatioTest { max_ratio: 0.75 }
    }
}

/// Multi-scale pattern training for extractors that are not scale invariant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidParams {
    /// Build the pyramid when the extractor reports no native scale invariance.
    pub enabled: bool,
    /// Number of downsampled levels below full resolution.
    pub levels: u32,
    /// Downsampling factor between consecutive levels.
    pub scale_step: f32,
}

impl Default for PyramidParams {
    fn default() -> Self {
        Self {
            enabled: true,
            levels: 4,
            scale_step: std::f32::consts::SQRT_2,
        }
    }
}

/// Configuration for [`crate::PatternDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub orb: OrbParams,
    pub matcher: MatcherParams,
    pub ransac: RansacParams,
    pub pyramid: PyramidParams,
    pub match_policy: MatchPolicy,
    /// Run the second, warped-frame matching pass.
    pub refine_homography: bool,
    /// A pass needs at least this many correspondences to attempt a fit and
    /// strictly more inliers to succeed.
    pub min_matches: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            orb: OrbParams::default(),
            matcher: MatcherParams::default(),
            ransac: RansacParams::default(),
            pyramid: PyramidParams::default(),
            match_policy: MatchPolicy::default(),
            refine_homography: true,
            min_matches: 8,
        }
    }
}
