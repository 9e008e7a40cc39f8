//! Reference pattern: pixels, outline and trained features.

use crate::{PatternError, PyramidParams};
use log::debug;
use nalgebra::{Point2, Point3};
use planar_ar_core::{resize_area, GrayImage, GrayImageView, ImageError};
use planar_ar_features::{Descriptors, FeatureExtractor, Keypoint};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A planar target as seen head-on.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternModel {
    /// Grayscale copy of the reference image.
    pub image: GrayImage,
    pub keypoints: Vec<Keypoint>,
    /// One row per entry of `keypoints`.
    pub descriptors: Descriptors,
    /// Image-space outline `(0,0), (w,0), (w,h), (0,h)`, clockwise on screen.
    pub quad2d: [Point2<f32>; 4],
    /// The same outline on the `Z = 0` plane, centred, with the longer side
    /// spanning `[-1, 1]`.
    pub quad3d: [Point3<f64>; 4],
}

impl PatternModel {
    pub fn width(&self) -> usize {
        self.image.width
    }

    pub fn height(&self) -> usize {
        self.image.height
    }

    pub fn size(&self) -> (usize, usize) {
        (self.image.width, self.image.height)
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Outline of a `width x height` image in pixels and on the unit plane.
pub fn pattern_quads(width: usize, height: usize) -> ([Point2<f32>; 4], [Point3<f64>; 4]) {
    let (w, h) = (width as f32, height as f32);
    let quad2d = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];

    let max_side = width.max(height).max(1) as f64;
    let uw = width as f64 / max_side;
    let uh = height as f64 / max_side;
    let quad3d = [
        Point3::new(-uw, -uh, 0.0),
        Point3::new(uw, -uh, 0.0),
        Point3::new(uw, uh, 0.0),
        Point3::new(-uw, uh, 0.0),
    ];
    (quad2d, quad3d)
}

fn checked_extract(
    extractor: &dyn FeatureExtractor,
    image: &GrayImageView<'_>,
) -> Result<(Vec<Keypoint>, Descriptors), PatternError> {
    let features = extractor.extract(image);
    if features.keypoints.len() != features.descriptors.rows() {
        return Err(PatternError::Misaligned {
            keypoints: features.keypoints.len(),
            rows: features.descriptors.rows(),
        });
    }
    Ok((features.keypoints, features.descriptors))
}

/// Build a [`PatternModel`] from a grayscale reference image.
///
/// Features are extracted at full resolution. When `pyramid.enabled` and the
/// extractor is not scale invariant, the image is also area-downsampled by
/// `scale_step^i` for `i = 1..=levels`; keypoints found there are mapped back
/// to full-resolution units and their descriptors stacked under the base set.
/// Descent stops at the first level that yields no features.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, extractor, pyramid), fields(w = image.width, h = image.height))
)]
pub fn build_pattern(
    image: &GrayImageView<'_>,
    extractor: &dyn FeatureExtractor,
    pyramid: &PyramidParams,
) -> Result<PatternModel, PatternError> {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height }.into());
    }
    if image.data.len() != width * height {
        return Err(ImageError::InvalidBuffer {
            expected: width * height,
            got: image.data.len(),
        }
        .into());
    }

    let (mut keypoints, mut descriptors) = checked_extract(extractor, image)?;
    debug!("pattern: {} keypoints at full resolution", keypoints.len());

    if pyramid.enabled && !extractor.is_scale_invariant() && pyramid.scale_step > 1.0 {
        for level in 1..=pyramid.levels {
            let factor = pyramid.scale_step.powi(level as i32);
            let dst_w = (width as f32 / factor).round() as usize;
            let dst_h = (height as f32 / factor).round() as usize;
            if dst_w == 0 || dst_h == 0 {
                break;
            }
            let small = resize_area(image, dst_w, dst_h);
            let (kps, descs) = checked_extract(extractor, &small.view())?;
            if kps.is_empty() {
                debug!("pattern: level {level} ({dst_w}x{dst_h}) empty, stopping");
                break;
            }

            descriptors.append(&descs)?;
            let sx = width as f32 / small.width as f32;
            let sy = height as f32 / small.height as f32;
            keypoints.extend(kps.iter().map(|k| k.rescaled(sx, sy, level)));
            debug!(
                "pattern: level {level} ({dst_w}x{dst_h}) added {} keypoints",
                kps.len()
            );
        }
    }

    let (quad2d, quad3d) = pattern_quads(width, height);
    Ok(PatternModel {
        image: image.to_owned_image(),
        keypoints,
        descriptors,
        quad2d,
        quad3d,
    })
}
