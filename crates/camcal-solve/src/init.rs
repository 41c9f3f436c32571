//! Closed-form initial guesses from per-view board homographies.

use camcal_core::{estimate_homography, CameraMatrix, Homography, Pose};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Point2, Point3, Rotation3};

/// Homography from board-plane `(X, Y)` to pixels for one view.
pub fn board_homography(object: &[Point3<f64>], image: &[Point2<f64>]) -> Option<Homography> {
    let plane: Vec<Point2<f64>> = object.iter().map(|p| Point2::new(p.x, p.y)).collect();
    estimate_homography(&plane, image)
}

/// Focal lengths from the vanishing points of the board axes and diagonals,
/// with the principal point fixed at `(cx, cy)`.
///
/// Each view contributes two linear equations in `1/fx^2, 1/fy^2`, so one
/// tilted view is enough. Returns `None` when the views carry no
/// perspective (all fronto-parallel).
pub fn focal_from_homographies(
    homographies: &[Homography],
    cx: f64,
    cy: f64,
) -> Option<(f64, f64)> {
    let n = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 2);
    let mut b = DVector::<f64>::zeros(2 * n);

    for (i, hom) in homographies.iter().enumerate() {
        let h = &hom.h;
        // Move the principal point to the origin.
        let centered = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0) * h;
        let c0 = centered.column(0).into_owned();
        let c1 = centered.column(1).into_owned();
        let d1 = (c0 + c1) * 0.5;
        let d2 = (c0 - c1) * 0.5;

        let [h0, v0, d1, d2] = [c0, c1, d1, d2].map(|v| {
            let norm = v.norm();
            if norm > 0.0 {
                v / norm
            } else {
                v
            }
        });

        a[(2 * i, 0)] = h0[0] * v0[0];
        a[(2 * i, 1)] = h0[1] * v0[1];
        b[2 * i] = -h0[2] * v0[2];
        a[(2 * i + 1, 0)] = d1[0] * d2[0];
        a[(2 * i + 1, 1)] = d1[1] * d2[1];
        b[2 * i + 1] = -d1[2] * d2[2];
    }

    let svd = a.svd(true, true);
    let f = svd.solve(&b, 1e-12).ok()?;
    let fx = (1.0 / f[0]).abs().sqrt();
    let fy = (1.0 / f[1]).abs().sqrt();
    if fx.is_finite() && fy.is_finite() && fx > 0.0 && fy > 0.0 {
        Some((fx, fy))
    } else {
        None
    }
}

/// Initial camera matrix for an image of `width x height`.
///
/// `aspect` (`fx / fy`) is enforced when given. Degenerate view sets fall
/// back to a focal length equal to the larger image side.
pub fn initial_camera(
    homographies: &[Homography],
    width: usize,
    height: usize,
    aspect: Option<f64>,
) -> CameraMatrix {
    let cx = (width as f64 - 1.0) * 0.5;
    let cy = (height as f64 - 1.0) * 0.5;
    let max_side = width.max(height) as f64;

    let (mut fx, mut fy) = match focal_from_homographies(homographies, cx, cy) {
        Some((fx, fy)) if fx < 100.0 * max_side && fy < 100.0 * max_side => (fx, fy),
        other => {
            warn!("focal initialisation degenerate ({other:?}); using the image size");
            (max_side, max_side)
        }
    };
    if let Some(ratio) = aspect {
        fy = 0.5 * (fx / ratio + fy);
        fx = ratio * fy;
    }
    debug!("initial camera: fx={fx:.2} fy={fy:.2} cx={cx:.2} cy={cy:.2}");
    CameraMatrix::new(fx, fy, cx, cy)
}

/// Board pose from a homography and intrinsics, with the rotation projected
/// onto SO(3) and the board in front of the camera.
pub fn pose_from_homography(k: &CameraMatrix, hom: &Homography) -> Option<Pose> {
    let k_inv = k.to_matrix().try_inverse()?;
    let h = &hom.h;
    let r1 = k_inv * h.column(0);
    let r2 = k_inv * h.column(1);
    let t = k_inv * h.column(2);

    let denom = 0.5 * (r1.norm() + r2.norm());
    if denom <= 1e-12 {
        return None;
    }
    let mut lambda = 1.0 / denom;
    if t.z * lambda < 0.0 {
        lambda = -lambda;
    }
    let r1 = r1 * lambda;
    let r2 = r2 * lambda;
    let t = t * lambda;
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return None;
    }

    let svd = Matrix3::from_columns(&[r1, r2, r3]).svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }

    let rotation = Rotation3::from_matrix_unchecked(r);
    Some(Pose::from_rotation(&rotation, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use camcal_core::{project_point, Distortion};
    use nalgebra::Vector3;

    fn board() -> Vec<Point3<f64>> {
        (0..5)
            .flat_map(|r| (0..7).map(move |c| Point3::new(c as f64 * 0.03, r as f64 * 0.03, 0.0)))
            .collect()
    }

    fn view(k: &CameraMatrix, pose: &Pose) -> (Homography, Vec<Point2<f64>>) {
        let obj = board();
        let img: Vec<_> = obj
            .iter()
            .map(|p| project_point(k, &Distortion::zero(), pose, p).unwrap())
            .collect();
        (board_homography(&obj, &img).unwrap(), img)
    }

    #[test]
    fn recovers_focal_from_single_tilted_view() {
        let k = CameraMatrix::new(820.0, 800.0, 319.5, 239.5);
        let pose = Pose::new(Vector3::new(0.35, -0.3, 0.05), Vector3::new(-0.08, -0.05, 0.6));
        let (h, _) = view(&k, &pose);
        let (fx, fy) = focal_from_homographies(&[h], k.cx, k.cy).unwrap();
        assert_relative_eq!(fx, 820.0, max_relative = 1e-6);
        assert_relative_eq!(fy, 800.0, max_relative = 1e-6);
    }

    #[test]
    fn fronto_parallel_views_fall_back_to_image_size() {
        let k = CameraMatrix::new(700.0, 700.0, 319.5, 239.5);
        let pose = Pose::new(Vector3::zeros(), Vector3::new(-0.09, -0.06, 0.5));
        let (h, _) = view(&k, &pose);
        let cam = initial_camera(&[h], 640, 480, None);
        assert_eq!(cam.fx, 640.0);
        assert_eq!(cam.fy, 640.0);
        assert_eq!((cam.cx, cam.cy), (319.5, 239.5));
    }

    #[test]
    fn decomposes_pose() {
        let k = CameraMatrix::new(800.0, 800.0, 320.0, 240.0);
        let pose = Pose::new(Vector3::new(0.2, -0.1, 0.3), Vector3::new(0.02, -0.03, 0.7));
        let (h, _) = view(&k, &pose);
        let est = pose_from_homography(&k, &h).unwrap();
        assert_relative_eq!(est.rvec, pose.rvec, epsilon = 1e-6);
        assert_relative_eq!(est.tvec, pose.tvec, epsilon = 1e-6);
    }

    #[test]
    fn fixed_aspect_is_enforced() {
        let k = CameraMatrix::new(810.0, 790.0, 319.5, 239.5);
        let pose = Pose::new(Vector3::new(0.3, 0.25, 0.0), Vector3::new(-0.09, -0.06, 0.6));
        let (h, _) = view(&k, &pose);
        let cam = initial_camera(&[h], 640, 480, Some(1.0));
        assert_eq!(cam.fx, cam.fy);
        assert!((cam.fx - 800.0).abs() < 20.0);
    }
}
