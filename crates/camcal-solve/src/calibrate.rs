//! Joint refinement of intrinsics, distortion and per-view board poses.

use crate::error::SolveError;
use crate::init::{board_homography, initial_camera, pose_from_homography};
use crate::lm::{minimize, NllsProblem};
use crate::options::{CalibrationFlags, SolveOptions};
use crate::result::CalibrationResult;
use camcal_core::{project_with_rotation, CameraMatrix, Distortion, Homography};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Point2, Point3, Rotation3, Vector3};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Board points and their detections in one image, index-paired.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarView {
    pub object: Vec<Point3<f64>>,
    pub image: Vec<Point2<f64>>,
}

impl PlanarView {
    pub fn new(object: Vec<Point3<f64>>, image: Vec<Point2<f64>>) -> Self {
        Self { object, image }
    }
}

// Intrinsic parameter slots.
const FX: usize = 0;
const FY: usize = 1;
const CX: usize = 2;
const CY: usize = 3;
const K1: usize = 4;
const K2: usize = 5;
const P1: usize = 6;
const P2: usize = 7;
const K3: usize = 8;
const N_INTR: usize = 9;
const POSE_DOF: usize = 6;

struct CalibrationProblem<'a> {
    views: &'a [PlanarView],
    /// Values of the intrinsics that are not optimised.
    base: [f64; N_INTR],
    /// Optimised intrinsic slots, in parameter-vector order.
    free: Vec<usize>,
    /// `fx / fy` when the aspect ratio is held.
    aspect: Option<f64>,
    /// First residual row of every view.
    row_offsets: Vec<usize>,
    n_residuals: usize,
}

impl<'a> CalibrationProblem<'a> {
    fn new(
        views: &'a [PlanarView],
        base: [f64; N_INTR],
        flags: &CalibrationFlags,
        aspect: Option<f64>,
    ) -> Self {
        let fixed = |slot: usize| match slot {
            FX => flags.fix_focal_length,
            FY => flags.fix_focal_length || aspect.is_some(),
            CX | CY => flags.fix_principal_point,
            K1 => flags.fix_k1,
            K2 => flags.fix_k2,
            P1 | P2 => flags.zero_tangent_dist,
            K3 => flags.fix_k3,
            _ => false,
        };
        let free = (0..N_INTR).filter(|&s| !fixed(s)).collect();

        let mut row_offsets = Vec::with_capacity(views.len());
        let mut rows = 0;
        for v in views {
            row_offsets.push(rows);
            rows += 2 * v.object.len();
        }

        Self {
            views,
            base,
            free,
            aspect,
            row_offsets,
            n_residuals: rows,
        }
    }

    fn n_free(&self) -> usize {
        self.free.len()
    }

    fn pack(&self, intr: &[f64; N_INTR], poses: &[[f64; POSE_DOF]]) -> DVector<f64> {
        let mut x = DVector::zeros(self.n_free() + POSE_DOF * poses.len());
        for (i, &slot) in self.free.iter().enumerate() {
            x[i] = intr[slot];
        }
        for (v, pose) in poses.iter().enumerate() {
            let o = self.n_free() + POSE_DOF * v;
            for (k, &val) in pose.iter().enumerate() {
                x[o + k] = val;
            }
        }
        x
    }

    fn intrinsics(&self, x: &DVector<f64>) -> [f64; N_INTR] {
        let mut intr = self.base;
        for (i, &slot) in self.free.iter().enumerate() {
            intr[slot] = x[i];
        }
        if let Some(aspect) = self.aspect {
            intr[FY] = intr[FX] / aspect;
        }
        intr
    }

    fn pose(&self, x: &DVector<f64>, view: usize) -> (Rotation3<f64>, Vector3<f64>) {
        let o = self.n_free() + POSE_DOF * view;
        let r = Vector3::new(x[o], x[o + 1], x[o + 2]);
        let t = Vector3::new(x[o + 3], x[o + 4], x[o + 5]);
        (Rotation3::from_scaled_axis(r), t)
    }

    /// Writes `observed - projected` of one view into `out`.
    fn view_residuals(
        &self,
        intr: &[f64; N_INTR],
        rotation: &Rotation3<f64>,
        t: &Vector3<f64>,
        view: usize,
        out: &mut [f64],
    ) -> bool {
        let (k, d) = split_intrinsics(intr);
        let v = &self.views[view];
        for (i, (obj, img)) in v.object.iter().zip(&v.image).enumerate() {
            let Some(px) = project_with_rotation(&k, &d, rotation, t, obj) else {
                return false;
            };
            out[2 * i] = img.x - px.x;
            out[2 * i + 1] = img.y - px.y;
        }
        true
    }
}

fn split_intrinsics(intr: &[f64; N_INTR]) -> (CameraMatrix, Distortion) {
    (
        CameraMatrix::new(intr[FX], intr[FY], intr[CX], intr[CY]),
        Distortion::from_slice(&intr[K1..=K3]),
    )
}

#[inline]
fn diff_step(v: f64) -> f64 {
    1e-6 * v.abs().max(1.0)
}

impl NllsProblem for CalibrationProblem<'_> {
    fn n_residuals(&self) -> usize {
        self.n_residuals
    }

    fn residuals(&self, x: &DVector<f64>) -> Option<DVector<f64>> {
        let intr = self.intrinsics(x);
        let mut r = DVector::zeros(self.n_residuals);
        for view in 0..self.views.len() {
            let (rot, t) = self.pose(x, view);
            let start = self.row_offsets[view];
            let len = 2 * self.views[view].object.len();
            let out = &mut r.as_mut_slice()[start..start + len];
            if !self.view_residuals(&intr, &rot, &t, view, out) {
                return None;
            }
        }
        Some(r)
    }

    /// Central differences. Intrinsic columns touch every view; pose
    /// columns only their own view's rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let n_free = self.n_free();
        let mut j = DMatrix::zeros(self.n_residuals, x.len());
        let mut xp = x.clone();

        for c in 0..n_free {
            let h = diff_step(x[c]);
            xp[c] = x[c] + h;
            let plus = self.residuals(&xp);
            xp[c] = x[c] - h;
            let minus = self.residuals(&xp);
            xp[c] = x[c];
            if let (Some(p), Some(m)) = (plus, minus) {
                j.set_column(c, &((p - m) / (2.0 * h)));
            }
        }

        let intr = self.intrinsics(x);
        for view in 0..self.views.len() {
            let start = self.row_offsets[view];
            let len = 2 * self.views[view].object.len();
            let mut plus = vec![0.0; len];
            let mut minus = vec![0.0; len];
            for k in 0..POSE_DOF {
                let c = n_free + POSE_DOF * view + k;
                let h = diff_step(x[c]);
                xp[c] = x[c] + h;
                let (rot, t) = self.pose(&xp, view);
                let ok_p = self.view_residuals(&intr, &rot, &t, view, &mut plus);
                xp[c] = x[c] - h;
                let (rot, t) = self.pose(&xp, view);
                let ok_m = self.view_residuals(&intr, &rot, &t, view, &mut minus);
                xp[c] = x[c];
                if ok_p && ok_m {
                    for row in 0..len {
                        j[(start + row, c)] = (plus[row] - minus[row]) / (2.0 * h);
                    }
                }
            }
        }
        j
    }
}

fn validate(
    views: &[PlanarView],
    image_size: (usize, usize),
    guess: Option<&CameraMatrix>,
    flags: &CalibrationFlags,
) -> Result<(), SolveError> {
    if views.is_empty() {
        return Err(SolveError::NoViews);
    }
    let (width, height) = image_size;
    if width == 0 || height == 0 {
        return Err(SolveError::InvalidImageSize { width, height });
    }
    for (i, v) in views.iter().enumerate() {
        if v.object.len() != v.image.len() {
            return Err(SolveError::ViewMismatch {
                view: i,
                objects: v.object.len(),
                images: v.image.len(),
            });
        }
        if v.object.len() < 4 {
            return Err(SolveError::TooFewPoints {
                view: i,
                got: v.object.len(),
            });
        }
    }

    if flags.use_intrinsic_guess {
        let k = guess.ok_or(SolveError::InvalidGuess(
            "intrinsic guess requested without a camera matrix",
        ))?;
        if !k.is_finite() || k.fx <= 0.0 || k.fy <= 0.0 {
            return Err(SolveError::InvalidGuess("focal lengths must be positive"));
        }
        if k.cx < 0.0 || k.cx >= width as f64 || k.cy < 0.0 || k.cy >= height as f64 {
            return Err(SolveError::InvalidGuess(
                "principal point must lie inside the image",
            ));
        }
    }
    if flags.fix_aspect_ratio {
        if let Some(k) = guess {
            if !(k.fx > 0.0 && k.fy > 0.0 && k.is_finite()) {
                return Err(SolveError::InvalidGuess(
                    "fixed aspect ratio needs positive focal lengths",
                ));
            }
        }
    }
    Ok(())
}

/// Calibrate a pinhole camera with Brown–Conrady distortion from planar
/// board views.
///
/// `camera` and `distortion` are starting values when
/// `flags.use_intrinsic_guess` is set; `camera` also provides the ratio held
/// by `flags.fix_aspect_ratio`. The returned `used_frames` indexes `views`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(views = views.len(), w = image_size.0, h = image_size.1))
)]
pub fn calibrate_camera(
    views: &[PlanarView],
    image_size: (usize, usize),
    camera: Option<&CameraMatrix>,
    distortion: Option<&Distortion>,
    options: &SolveOptions,
) -> Result<CalibrationResult, SolveError> {
    let flags = options.flags;
    validate(views, image_size, camera, &flags)?;

    let homographies = views
        .iter()
        .enumerate()
        .map(|(i, v)| board_homography(&v.object, &v.image).ok_or(SolveError::DegenerateView(i)))
        .collect::<Result<Vec<Homography>, _>>()?;

    let aspect = flags
        .fix_aspect_ratio
        .then(|| camera.map(|k| k.fx / k.fy).unwrap_or(1.0));

    let k0 = match camera {
        Some(k) if flags.use_intrinsic_guess => {
            let mut k = *k;
            if let Some(a) = aspect {
                k.fy = k.fx / a;
            }
            k
        }
        _ => initial_camera(&homographies, image_size.0, image_size.1, aspect),
    };
    let mut d0 = match distortion {
        Some(d) if flags.use_intrinsic_guess => *d,
        _ => Distortion::zero(),
    };
    if flags.zero_tangent_dist {
        d0.p1 = 0.0;
        d0.p2 = 0.0;
    }

    let poses = homographies
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let pose = pose_from_homography(&k0, h).ok_or(SolveError::DegenerateView(i))?;
            let (r, t) = (pose.rvec, pose.tvec);
            Ok([r.x, r.y, r.z, t.x, t.y, t.z])
        })
        .collect::<Result<Vec<_>, SolveError>>()?;

    let d = d0.to_array();
    let base = [k0.fx, k0.fy, k0.cx, k0.cy, d[0], d[1], d[2], d[3], d[4]];
    let problem = CalibrationProblem::new(views, base, &flags, aspect);
    let x0 = problem.pack(&base, &poses);
    debug!(
        "refining {} parameters over {} residuals",
        x0.len(),
        problem.n_residuals
    );

    let (x, report) = minimize(&problem, x0, options).ok_or(SolveError::NonFinite)?;
    if !report.converged {
        warn!(
            "calibration stopped after {} evaluations without converging",
            report.evaluations
        );
    }

    let intr = problem.intrinsics(&x);
    let (k, dist) = split_intrinsics(&intr);
    if !k.is_finite() || !dist.is_finite() || k.fx <= 0.0 || k.fy <= 0.0 {
        return Err(SolveError::NonFinite);
    }

    let r = problem.residuals(&x).ok_or(SolveError::NonFinite)?;
    let mut per_view_rms = Vec::with_capacity(views.len());
    let mut rvecs = Vec::with_capacity(views.len());
    let mut tvecs = Vec::with_capacity(views.len());
    for (view, v) in views.iter().enumerate() {
        let start = problem.row_offsets[view];
        let len = 2 * v.object.len();
        let sq: f64 = r.rows(start, len).norm_squared();
        per_view_rms.push((sq / v.object.len() as f64).sqrt());
        let (rot, t) = problem.pose(&x, view);
        rvecs.push(rot.scaled_axis());
        tvecs.push(t);
    }
    let n_points: usize = views.iter().map(|v| v.object.len()).sum();
    let rms = (r.norm_squared() / n_points as f64).sqrt();
    if !rms.is_finite() {
        return Err(SolveError::NonFinite);
    }

    info!(
        "calibrated {} views in {} evaluations: rms {:.4} px, fx {:.2} fy {:.2}",
        views.len(),
        report.evaluations,
        rms,
        k.fx,
        k.fy
    );

    Ok(CalibrationResult {
        rms,
        camera_matrix: k,
        distortion: dist,
        rvecs,
        tvecs,
        image_size,
        per_view_rms,
        used_frames: (0..views.len()).collect(),
    })
}
