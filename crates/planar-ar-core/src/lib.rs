//! Core types for planar pattern tracking.
//!
//! Pixel buffers and luma conversion, perspective geometry (homographies,
//! warping), a generic seeded RANSAC engine, the pinhole camera model and
//! planar pose recovery. Nothing here knows about features or matching.

mod camera;
mod homography;
mod image;
#[cfg(feature = "tracing")]
mod logger;
mod pose;
mod ransac;
mod resize;

pub use camera::CameraModel;
pub use homography::{estimate_homography, homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_u8, to_gray, ChannelOrder, FrameView, GrayImage,
    GrayImageView, ImageError,
};
pub use pose::{pose_from_homography, Pose};
pub use ransac::{ransac, Estimator, RansacOptions, RansacResult};
pub use resize::resize_area;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;
