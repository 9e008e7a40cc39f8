//! High-level facade crate for the `planar-ar-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates,
//! - [`ArPipeline`], which owns a trained detector and the latest
//!   [`TrackingResult`] for a render loop to poll,
//! - (feature-gated) helpers that take `image` crate buffers directly.
//!
//! ## Quickstart
//!
//! ```no_run
//! use planar_ar::{detect, ArPipeline, CameraModel, DetectorParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pattern = detect::load_gray("pattern.png")?;
//! let frame = detect::load_gray("frame.png")?;
//!
//! let mut pipeline =
//!     detect::pipeline_from_image(&pattern, CameraModel::default(), DetectorParams::default())?;
//! if pipeline.process_frame(&detect::gray_view(&frame).into())? {
//!     println!("pattern at {:?}", pipeline.result().projected_quad);
//!     println!("pose {:?}", pipeline.pattern_location());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `planar_ar::core`: pixel buffers, homographies, RANSAC, camera and pose.
//! - `planar_ar::features`: keypoints, descriptors, ORB extraction, matching.
//! - `planar_ar::tracker`: pattern model, detector, JSON config and reports.
//! - `planar_ar::detect` (feature `image`): helpers from `image::GrayImage`.

pub use planar_ar_core as core;
pub use planar_ar_features as features;
pub use planar_ar_tracker as tracker;

pub use planar_ar_core::{CameraModel, FrameView, GrayImage, GrayImageView, Homography, Pose};
pub use planar_ar_tracker::{
    DetectError, DetectorParams, MatchPolicy, PatternDetector, PatternError, PatternModel,
    TrackingResult,
};

mod pipeline;
pub use pipeline::ArPipeline;

#[cfg(feature = "image")]
pub mod detect;
