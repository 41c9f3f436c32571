//! Camera calibration from planar chessboard views.
//!
//! [`calibrate_camera`] estimates `fx, fy, cx, cy`, the Brown–Conrady
//! coefficients `k1, k2, p1, p2, k3` and one board pose per view:
//!
//! 1. a normalized DLT homography per view,
//! 2. closed-form focal lengths from the board's vanishing directions with
//!    the principal point at the image centre,
//! 3. per-view poses from homography decomposition,
//! 4. Levenberg–Marquardt over all parameters not held by
//!    [`CalibrationFlags`].

mod calibrate;
mod error;
pub mod init;
pub mod lm;
mod options;
mod result;

pub use calibrate::{calibrate_camera, PlanarView};
pub use error::SolveError;
pub use options::{CalibrationFlags, SolveOptions};
pub use result::CalibrationResult;
