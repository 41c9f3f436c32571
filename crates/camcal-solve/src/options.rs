use serde::{Deserialize, Serialize};

/// Switches that hold parts of the camera model fixed during refinement.
///
/// All flags are off by default: every intrinsic, all five distortion
/// coefficients and every pose are estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationFlags {
    /// Start from the supplied camera matrix and distortion instead of the
    /// closed-form initialisation.
    pub use_intrinsic_guess: bool,
    /// Keep `cx, cy` at their initial value (image centre unless guessed).
    pub fix_principal_point: bool,
    /// Keep `fx / fy` at the ratio of the supplied camera matrix (1 when
    /// none is given).
    pub fix_aspect_ratio: bool,
    pub fix_focal_length: bool,
    /// Force `p1 = p2 = 0`.
    pub zero_tangent_dist: bool,
    pub fix_k1: bool,
    pub fix_k2: bool,
    pub fix_k3: bool,
}

/// Refinement settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolveOptions {
    pub flags: CalibrationFlags,
    /// Evaluation budget, in multiples of the parameter count.
    pub max_iters: usize,
    /// Stop when the relative cost decrease falls below this.
    pub ftol: f64,
    /// Stop when the trust region shrinks below this, relative to the
    /// parameter norm.
    pub xtol: f64,
    /// Stop when the residuals are this close to orthogonal to every
    /// Jacobian column.
    pub gtol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            flags: CalibrationFlags::default(),
            max_iters: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
        }
    }
}
