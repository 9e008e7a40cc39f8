//! Keypoints, descriptors and matching for planar pattern tracking.
//!
//! Two object-safe seams, [`FeatureExtractor`] and [`DescriptorMatcher`], with
//! one implementation each:
//!
//! - [`OrbExtractor`]: FAST-9 + 3x3 NMS, intensity-centroid orientation,
//!   256 steered binary tests on a 5x5 box-smoothed image.
//! - [`BruteForceMatcher`]: exhaustive Hamming / L2 matching with optional
//!   cross-check and k-NN, plus the [`ratio_test`] filter.
//!
//! ```
//! use planar_ar_core::GrayImage;
//! use planar_ar_features::{
//!     BruteForceMatcher, DescriptorMatcher, FeatureExtractor, MatcherParams, OrbExtractor,
//! };
//!
//! let img = GrayImage::new(64, 64);
//! let orb = OrbExtractor::default();
//! let features = orb.extract(&img.view());
//! assert!(features.is_empty());
//!
//! let mut matcher = BruteForceMatcher::new(MatcherParams::default());
//! matcher.train(&features.descriptors);
//! assert!(matcher.match_nearest(&features.descriptors).is_empty());
//! ```

mod descriptor;
mod extractor;
mod fast;
mod keypoint;
mod matcher;
mod orb;
mod smooth;

pub use descriptor::{hamming, l2, DescriptorError, DescriptorKind, Descriptors};
pub use extractor::{FeatureExtractor, Features};
pub use keypoint::Keypoint;
pub use matcher::{ratio_test, BruteForceMatcher, Correspondence, DescriptorMatcher, MatcherParams};
pub use orb::{OrbExtractor, OrbParams, DESCRIPTOR_BYTES, EDGE_THRESHOLD, PATCH_RADIUS};
