//! Pinhole camera intrinsics with Brown-Conrady distortion.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// Camera intrinsics plus `[k1, k2, p1, p2, k3]` distortion.
///
/// Treated as immutable once handed to a detector; clone it to share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraModel {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: [f64; 5],
}

impl Default for CameraModel {
    /// A 640x480 camera with a ~60° horizontal field of view and no distortion.
    fn default() -> Self {
        Self::new(554.0, 554.0, 320.0, 240.0)
    }
}

impl CameraModel {
    /// Distortion-free camera.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            distortion: [0.0; 5],
        }
    }

    pub fn with_distortion(mut self, distortion: [f64; 5]) -> Self {
        self.distortion = distortion;
        self
    }

    /// Returns `true` when every parameter is finite and the focal lengths are non-zero.
    pub fn is_valid(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .chain(self.distortion.iter())
            .all(|v| v.is_finite())
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    pub fn has_distortion(&self) -> bool {
        self.distortion.iter().any(|&d| d != 0.0)
    }

    /// `K = [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    fn distort_normalized(&self, x: f64, y: f64) -> (f64, f64) {
        let [k1, k2, p1, p2, k3] = self.distortion;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r6;
        let x_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let y_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (x * radial + x_tan, y * radial + y_tan)
    }

    /// Project a camera-frame point to distorted pixel coordinates.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 1e-12 {
            return None;
        }
        let (xd, yd) = self.distort_normalized(p.x / p.z, p.y / p.z);
        let out = Point2::new(self.fx * xd + self.cx, self.fy * yd + self.cy);
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }

    /// Map an ideal (undistorted) pixel to where the lens actually images it.
    pub fn distort_pixel(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        if !self.is_valid() {
            return None;
        }
        let xn = (p.x - self.cx) / self.fx;
        let yn = (p.y - self.cy) / self.fy;
        let (xd, yd) = self.distort_normalized(xn, yn);
        let out = Point2::new(self.fx * xd + self.cx, self.fy * yd + self.cy);
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }

    /// Inverse of [`CameraModel::distort_pixel`] by fixed-point iteration.
    ///
    /// Exact (and free) when the model carries no distortion.
    pub fn undistort_pixel(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        if !self.is_valid() {
            return None;
        }
        if !self.has_distortion() {
            return Some(p);
        }

        let [k1, k2, p1, p2, k3] = self.distortion;
        let xd = (p.x - self.cx) / self.fx;
        let yd = (p.y - self.cy) / self.fy;
        let (mut x, mut y) = (xd, yd);

        for _ in 0..20 {
            let r2 = x * x + y * y;
            let r4 = r2 * r2;
            let radial = 1.0 + k1 * r2 + k2 * r4 + k3 * r4 * r2;
            if !radial.is_finite() || radial.abs() < 1e-12 {
                return None;
            }
            let dx_tan = 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
            let dy_tan = p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
            let x_next = (xd - dx_tan) / radial;
            let y_next = (yd - dy_tan) / radial;
            if !x_next.is_finite() || !y_next.is_finite() {
                return None;
            }
            let step = (x_next - x).hypot(y_next - y);
            x = x_next;
            y = y_next;
            if step <= 1e-12 {
                break;
            }
        }

        Some(Point2::new(self.fx * x + self.cx, self.fy * y + self.cy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn intrinsic_matrix_layout() {
        let cam = CameraModel::new(500.0, 510.0, 320.0, 240.0);
        let k = cam.intrinsic_matrix();
        assert_eq!(k[(0, 0)], 500.0);
        assert_eq!(k[(1, 1)], 510.0);
        assert_eq!(k[(0, 2)], 320.0);
        assert_eq!(k[(1, 2)], 240.0);
        assert_eq!(k[(2, 2)], 1.0);
        assert_eq!(k[(1, 0)], 0.0);
    }

    #[test]
    fn project_principal_axis_hits_principal_point() {
        let cam = CameraModel::default().with_distortion([0.1, -0.02, 0.001, 0.0, 0.0]);
        let p = cam.project(&Point3::new(0.0, 0.0, 2.0)).expect("in front");
        assert_relative_eq!(p.x, cam.cx, epsilon = 1e-12);
        assert_relative_eq!(p.y, cam.cy, epsilon = 1e-12);
        assert!(cam.project(&Point3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn undistort_inverts_distort() {
        let cam = CameraModel::new(600.0, 600.0, 320.0, 240.0)
            .with_distortion([-0.2, 0.05, 0.001, -0.0005, 0.0]);
        let ideal = Point2::new(100.0, 400.0);
        let distorted = cam.distort_pixel(ideal).expect("distort");
        let back = cam.undistort_pixel(distorted).expect("undistort");
        assert_relative_eq!(back.x, ideal.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, ideal.y, epsilon = 1e-6);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cam: CameraModel = serde_json::from_str(r#"{"fx": 800.0}"#).expect("parse");
        assert_eq!(cam.fx, 800.0);
        assert_eq!(cam.cx, CameraModel::default().cx);
        assert_eq!(cam.distortion, [0.0; 5]);
    }
}
