use crate::{Descriptors, Keypoint};
use planar_ar_core::GrayImageView;

/// Keypoints plus their row-aligned descriptors.
#[derive(Clone, Debug, PartialEq)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Descriptors,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Stateless keypoint + descriptor computation on a grayscale image.
pub trait FeatureExtractor: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Detect keypoints and describe them. Must return as many descriptor rows
    /// as keypoints; an image without usable texture yields an empty set, not
    /// an error.
    fn extract(&self, image: &GrayImageView<'_>) -> Features;

    /// Whether keypoints are repeatable across image scales without an
    /// explicit pyramid.
    fn is_scale_invariant(&self) -> bool {
        false
    }
}
