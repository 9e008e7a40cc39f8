use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Salient image location with scale and orientation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Pixel x (column) coordinate.
    pub x: f32,
    /// Pixel y (row) coordinate.
    pub y: f32,
    /// Diameter of the support region, in pixels.
    pub size: f32,
    /// Orientation in radians, `atan2(dy, dx)` in image axes.
    pub angle: f32,
    /// Detector response; larger is stronger.
    pub response: f32,
    /// Pyramid level the keypoint came from (0 = full resolution).
    pub octave: u32,
}

impl Keypoint {
    #[inline]
    pub fn pt(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    /// Map a keypoint found on an image downsampled by `sx` horizontally and
    /// `sy` vertically back to full-image units. Pixel centres stay aligned:
    /// column `i` of the small image maps to `(i + 0.5) * sx - 0.5`.
    pub fn rescaled(&self, sx: f32, sy: f32, octave: u32) -> Keypoint {
        Keypoint {
            x: (self.x + 0.5) * sx - 0.5,
            y: (self.y + 0.5) * sy - 0.5,
            size: self.size * 0.5 * (sx + sy),
            octave,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_multiplies_position_and_size() {
        let kp = Keypoint {
            x: 10.0,
            y: 4.0,
            size: 31.0,
            angle: 0.5,
            response: 12.0,
            octave: 0,
        };
        let up = kp.rescaled(2.0, 2.0, 2);
        assert_eq!((up.x, up.y, up.size), (20.5, 8.5, 62.0));
        assert_eq!(up.angle, 0.5);
        assert_eq!(up.octave, 2);
    }
}
