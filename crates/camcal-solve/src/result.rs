use camcal_core::{CameraMatrix, Distortion, Pose};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Outcome of a calibration solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Root-mean-square reprojection error over all points, in pixels.
    pub rms: f64,
    pub camera_matrix: CameraMatrix,
    pub distortion: Distortion,
    /// Board rotation (Rodrigues) per used view.
    pub rvecs: Vec<Vector3<f64>>,
    /// Board translation per used view, in cell-size units.
    pub tvecs: Vec<Vector3<f64>>,
    /// `(width, height)` the intrinsics refer to.
    pub image_size: (usize, usize),
    pub per_view_rms: Vec<f64>,
    /// Indices of the input frames that contributed a view.
    pub used_frames: Vec<usize>,
}

impl CalibrationResult {
    pub fn pose(&self, view: usize) -> Option<Pose> {
        Some(Pose::new(*self.rvecs.get(view)?, *self.tvecs.get(view)?))
    }

    /// Markdown-style report of the main numbers.
    pub fn summary(&self) -> String {
        let k = &self.camera_matrix;
        let d = self.distortion.to_array();
        let mut out = String::new();
        let _ = writeln!(out, "## Camera Calibration Results");
        let _ = writeln!(out, "* The number of selected images = {}", self.used_frames.len());
        let _ = writeln!(out, "* RMS error = {:.6}", self.rms);
        let _ = writeln!(out, "* Camera matrix (K) =");
        let _ = writeln!(out, "  [{:12.4} {:12.4} {:12.4}]", k.fx, 0.0, k.cx);
        let _ = writeln!(out, "  [{:12.4} {:12.4} {:12.4}]", 0.0, k.fy, k.cy);
        let _ = writeln!(out, "  [{:12.4} {:12.4} {:12.4}]", 0.0, 0.0, 1.0);
        let _ = writeln!(
            out,
            "* Distortion coefficient (k1, k2, p1, p2, k3) = [{:.6}, {:.6}, {:.6}, {:.6}, {:.6}]",
            d[0], d[1], d[2], d[3], d[4]
        );
        out
    }
}
