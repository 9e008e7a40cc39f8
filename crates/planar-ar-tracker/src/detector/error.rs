use planar_ar_core::ImageError;
use planar_ar_features::DescriptorError;

/// Errors raised while building or training a pattern.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("extractor returned {keypoints} keypoints but {rows} descriptor rows")]
    Misaligned { keypoints: usize, rows: usize },
    #[error("pattern has no keypoints")]
    EmptyPattern,
}

/// Errors returned by [`crate::PatternDetector::detect`].
///
/// A pattern that is simply not visible is not an error; see
/// [`crate::TrackingResult::found`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("detector has not been trained")]
    NotTrained,
    #[error("camera intrinsics are not finite or have a zero focal length")]
    InvalidCamera,
    #[error(transparent)]
    Image(#[from] ImageError),
}
