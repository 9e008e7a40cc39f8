//! Planar pattern detection and pose recovery.
//!
//! A [`PatternDetector`] is trained once on a reference image and then
//! locates that image in each incoming frame:
//!
//! 1. extract and match features against the pattern,
//! 2. fit a rough pattern -> frame homography with RANSAC,
//! 3. optionally warp the frame back into pattern space, match again and
//!    compose the refinement onto the rough homography,
//! 4. project the pattern outline and decompose a camera pose.
//!
//! Not seeing the pattern is a normal outcome and is reported through
//! [`TrackingResult::found`], never as an error.
//!
//! ```no_run
//! use planar_ar_core::{CameraModel, FrameView, GrayImage};
//! use planar_ar_tracker::{DetectorParams, PatternDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reference = GrayImage::new(320, 240);
//! let frame = GrayImage::new(640, 480);
//!
//! let mut detector = PatternDetector::new(CameraModel::default(), DetectorParams::default());
//! let pattern = detector.build_pattern(&FrameView::from(reference.view()))?;
//! detector.train(pattern)?;
//!
//! let result = detector.detect_gray(&frame.view())?;
//! if result.found {
//!     println!("corners: {:?}", result.projected_quad);
//! }
//! # Ok(())
//! # }
//! ```

mod detector;
mod estimator;
pub mod io;
mod pattern;

pub use detector::{
    DetectError, DetectionStats, DetectorParams, MatchPolicy, PatternDetector, PatternError,
    PyramidParams, TrackingResult,
};
pub use estimator::{
    HomographyFit, RansacHomographyEstimator, RansacParams, RobustHomographyEstimator,
};
pub use io::{FrameReport, PoseReport, TrackerConfig, TrackerIoError, TrackingReport};
pub use pattern::{build_pattern, pattern_quads, PatternModel};
