//! Rigid pose and planar pose-from-homography.

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform `X_cam = R * X_pattern + t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl Pose {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    /// The opposite direction: camera coordinates into pattern coordinates.
    pub fn inverse(&self) -> Pose {
        let rt = self.rotation.transpose();
        Pose {
            rotation: rt,
            translation: -(rt * self.translation),
        }
    }

    /// Row-major 4x4 `[R | t; 0 0 0 1]`.
    pub fn to_matrix4(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[(0, 0)], r[(0, 1)], r[(0, 2)], t.x],
            [r[(1, 0)], r[(1, 1)], r[(1, 2)], t.y],
            [r[(2, 0)], r[(2, 1)], r[(2, 2)], t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Decompose a plane-induced homography (`Z = 0` plane -> ideal pixels) into
/// the pose of that plane in the camera frame.
///
/// The first two columns of `K⁻¹H` are scaled to unit mean norm, the sign is
/// chosen so the plane lies in front of the camera (`t.z > 0`), and the
/// resulting rotation is projected onto SO(3) via SVD. Returns `None` for a
/// singular `K` or a degenerate homography.
pub fn pose_from_homography(k: &Matrix3<f64>, h: &Matrix3<f64>) -> Option<Pose> {
    let k_inv = k.try_inverse()?;

    let k_inv_h1 = k_inv * h.column(0);
    let k_inv_h2 = k_inv * h.column(1);
    let k_inv_h3 = k_inv * h.column(2);

    let norm1 = k_inv_h1.norm();
    let norm2 = k_inv_h2.norm();
    if norm1 <= 1e-12 || norm2 <= 1e-12 || !norm1.is_finite() || !norm2.is_finite() {
        return None;
    }
    let lambda = 2.0 / (norm1 + norm2);

    let mut r1 = k_inv_h1 * lambda;
    let mut r2 = k_inv_h2 * lambda;
    let mut t = k_inv_h3 * lambda;
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return None;
    }

    let r_approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r_approx.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        rotation = u_flipped * v_t;
    }

    if !rotation.iter().chain(t.iter()).all(|v| v.is_finite()) {
        return None;
    }
    Some(Pose::new(rotation, t))
}
