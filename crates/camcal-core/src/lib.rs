//! Core types for chessboard camera calibration.
//!
//! This crate holds the pieces shared by the detector, the solver and the
//! video pipeline: frames and gray views, board geometry, the pinhole camera
//! with Brown–Conrady distortion, planar homographies and undistortion maps.
//! It does not depend on any image codec or video backend.

mod board;
mod camera;
mod homography;
mod image;
mod logger;
mod rectify;
pub mod synthetic;

pub use board::{BoardError, BoardPattern, CellSize};
pub use camera::{project_point, project_with_rotation, CameraMatrix, Distortion, Pose};
pub use homography::{estimate_homography, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_u8, Frame, FrameError, GrayImage, GrayImageView,
};
pub use rectify::{remap_bilinear, UndistortMap};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
