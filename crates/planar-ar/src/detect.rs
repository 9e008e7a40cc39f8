//! Helpers that accept `image` crate buffers.

use crate::core::{ChannelOrder, FrameView, GrayImageView};
use crate::tracker::{DetectorParams, PatternDetector, PatternError, PatternModel};
use crate::{ArPipeline, CameraModel, DetectError, TrackingResult};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Borrow an `image::RgbImage` as a 3-channel frame.
pub fn rgb_frame(img: &::image::RgbImage) -> FrameView<'_> {
    FrameView {
        width: img.width() as usize,
        height: img.height() as usize,
        channels: 3,
        order: ChannelOrder::Rgb,
        data: img.as_raw(),
    }
}

/// Decode any supported image file to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, ::image::ImageError> {
    Ok(::image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_luma8())
}

/// Build a pattern model with `detector`'s extractor and pyramid settings.
pub fn build_pattern(
    detector: &PatternDetector,
    img: &::image::GrayImage,
) -> Result<PatternModel, PatternError> {
    detector.build_pattern(&gray_view(img).into())
}

/// Run a trained detector on an `image::GrayImage`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(detector, img), fields(width = img.width(), height = img.height()))
)]
pub fn detect_pattern(
    detector: &PatternDetector,
    img: &::image::GrayImage,
) -> Result<TrackingResult, DetectError> {
    detector.detect_gray(&gray_view(img))
}

/// Train a pipeline on a grayscale reference image.
pub fn pipeline_from_image(
    pattern: &::image::GrayImage,
    camera: CameraModel,
    params: DetectorParams,
) -> Result<ArPipeline, PatternError> {
    ArPipeline::with_params(&gray_view(pattern).into(), camera, params)
}
