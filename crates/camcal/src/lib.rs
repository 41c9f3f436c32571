//! Chessboard camera calibration from a frame stream.
//!
//! The crate ties the workspace together:
//! - [`select`]: operator-driven (or batch) choice of calibration frames,
//! - [`calibrate`]: board detection on every frame and the camera solve,
//! - [`rectifier`]: live side-by-side undistortion with a toggle,
//! - [`pipeline`]: all three over one reopenable source.
//!
//! Sources, sinks and the operator display are traits ([`io`],
//! [`display`]), so the whole flow runs without a window or a video codec.
//!
//! ## Quickstart
//!
//! ```no_run
//! use camcal::core::{BoardPattern, CellSize};
//! use camcal::{HeadlessDisplay, Pipeline, PipelineConfig};
//! use camcal::sequence::{ImageSequenceProvider, PngSequenceProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = PipelineConfig::new(BoardPattern::new(10, 7)?);
//! config.cell_size = CellSize::new(0.025)?;
//! config.select.select_all = true;
//!
//! let mut frames = ImageSequenceProvider::new("frames/");
//! let mut out = PngSequenceProvider::new("rectified/");
//! let outcome = Pipeline::new(config).run(&mut frames, &mut out, &mut HeadlessDisplay)?;
//! print!("{}", outcome.calibration.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `camcal::core`: frames, board geometry, camera model, undistortion maps.
//! - `camcal::chessboard`: the inner-corner detector.
//! - `camcal::solve`: initialisation and Levenberg–Marquardt calibration.
//! - `camcal::sequence` (feature `image`): image-directory source, PNG sink.

pub use camcal_chessboard as chessboard;
pub use camcal_core as core;
pub use camcal_solve as solve;

pub mod calibrate;
pub mod config;
pub mod display;
mod error;
pub mod io;
pub mod pipeline;
pub mod rectifier;
pub mod select;

#[cfg(feature = "image")]
pub mod sequence;

pub use calibrate::{calibrate, Calibrator};
pub use config::{load_result_json, write_result_json, PipelineConfig};
pub use display::{Display, HeadlessDisplay, ScriptedDisplay, Signal, SignalScript, View, Wait};
pub use error::{ConfigError, PipelineError, SourceError};
pub use io::{FrameSink, FrameSource, SinkProvider, SourceProvider, StreamInfo};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use rectifier::{RectifyReport, Rectifier, ViewMode};
pub use select::{select, FrameSelector, SelectOptions};

pub use camcal_chessboard::{ChessboardDetector, ChessboardParams};
pub use camcal_core::{BoardPattern, CameraMatrix, CellSize, Distortion, Frame};
pub use camcal_solve::{CalibrationFlags, CalibrationResult, SolveOptions};

/// Install a `tracing` subscriber and route `log` records into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    camcal_core::init_tracing(json);
    // The subscriber may already have installed the bridge.
    let _ = tracing_log::LogTracer::init();
}
