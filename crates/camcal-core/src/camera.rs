//! Pinhole camera with Brown–Conrady lens distortion.
//!
//! Conventions:
//! - pixel = `K * distort(X_c / Z_c)` with `K = [fx 0 cx; 0 fy cy; 0 0 1]`,
//! - rotations are exchanged as Rodrigues vectors (axis * angle),
//! - a pose maps board coordinates into the camera frame: `X_c = R X_b + t`.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Intrinsic matrix parameters (zero skew).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraMatrix {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Reads fx, fy, cx, cy from a 3x3 matrix; the skew entry is ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.fx.is_finite() && self.fy.is_finite() && self.cx.is_finite() && self.cy.is_finite()
    }

    #[inline]
    pub fn normalized_to_pixel(&self, n: Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    #[inline]
    pub fn pixel_to_normalized(&self, p: Point2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

/// Brown–Conrady coefficients, exchanged in the order `k1, k2, p1, p2, k3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub const LEN: usize = 5;

    pub fn zero() -> Self {
        Self::default()
    }

    /// Build from a coefficient slice in `k1, k2, p1, p2, k3` order.
    ///
    /// Shorter slices leave the trailing coefficients at zero; extra entries
    /// are ignored.
    pub fn from_slice(coeffs: &[f64]) -> Self {
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&c| c == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }

    /// Apply distortion to ideal normalized coordinates.
    #[inline]
    pub fn distort(&self, n: Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Vector2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, d: Vector2<f64>, iters: usize) -> Vector2<f64> {
        let mut x = d.x;
        let mut y = d.y;
        for _ in 0..iters {
            let r2 = x * x + y * y;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            if radial.abs() < 1e-12 || !radial.is_finite() {
                break;
            }
            let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            x = (d.x - x_tan) / radial;
            y = (d.y - y_tan) / radial;
        }
        Vector2::new(x, y)
    }
}

/// Rigid board-to-camera transform stored as Rodrigues rotation + translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn from_rotation(rotation: &Rotation3<f64>, tvec: Vector3<f64>) -> Self {
        Self {
            rvec: rotation.scaled_axis(),
            tvec,
        }
    }

    #[inline]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_scaled_axis(self.rvec)
    }

    #[inline]
    pub fn transform(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }
}

/// Project a board point through pose, lens distortion and intrinsics.
///
/// Returns `None` for points at or behind the camera centre.
pub fn project_point(
    k: &CameraMatrix,
    dist: &Distortion,
    pose: &Pose,
    p: &Point3<f64>,
) -> Option<Point2<f64>> {
    project_with_rotation(k, dist, &pose.rotation(), &pose.tvec, p)
}

/// Same as [`project_point`] with a precomputed rotation matrix.
#[inline]
pub fn project_with_rotation(
    k: &CameraMatrix,
    dist: &Distortion,
    rotation: &Rotation3<f64>,
    tvec: &Vector3<f64>,
    p: &Point3<f64>,
) -> Option<Point2<f64>> {
    let pc = rotation * p.coords + tvec;
    if pc.z <= f64::EPSILON {
        return None;
    }
    let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
    Some(k.normalized_to_pixel(dist.distort(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficient_order_is_k1_k2_p1_p2_k3() {
        let d = Distortion::from_slice(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(d.k1, 0.1);
        assert_eq!(d.p1, 0.3);
        assert_eq!(d.k3, 0.5);
        assert_eq!(d.to_array(), [0.1, 0.2, 0.3, 0.4, 0.5]);
        assert_eq!(Distortion::from_slice(&[0.1]).k2, 0.0);
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion {
            k1: -0.28,
            k2: 0.09,
            p1: 0.001,
            p2: -0.0005,
            k3: -0.01,
        };
        for &(x, y) in &[(0.0, 0.0), (0.3, -0.2), (-0.5, 0.4), (0.1, 0.6)] {
            let n = Vector2::new(x, y);
            let back = d.undistort(d.distort(n), 50);
            assert_relative_eq!(back, n, epsilon = 1e-9);
        }
    }

    #[test]
    fn projects_principal_ray_to_principal_point() {
        let k = CameraMatrix::new(800.0, 810.0, 320.0, 240.0);
        let pose = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 2.0));
        let px = project_point(&k, &Distortion::zero(), &pose, &Point3::origin()).unwrap();
        assert_relative_eq!(px, Point2::new(320.0, 240.0));

        let behind = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0));
        assert!(project_point(&k, &Distortion::zero(), &behind, &Point3::origin()).is_none());
    }

    #[test]
    fn matrix_roundtrip_keeps_parameters() {
        let k = CameraMatrix::new(700.0, 690.0, 300.5, 250.25);
        assert_eq!(CameraMatrix::from_matrix(&k.to_matrix()), k);
        let px = k.normalized_to_pixel(Vector2::new(0.1, -0.2));
        assert_relative_eq!(k.pixel_to_normalized(px), Vector2::new(0.1, -0.2), epsilon = 1e-12);
    }
}
