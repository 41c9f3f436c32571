use camcal_core::{BoardError, BoardPattern, FrameError};
use camcal_solve::SolveError;

/// Failures of frame sources and sinks.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("cannot open {what}: {reason}")]
    Open { what: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("frame has {channels} channels, which cannot be encoded")]
    Unencodable { channels: usize },
}

impl SourceError {
    pub fn open(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Open {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors of the select → calibrate → rectify pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),
    #[error("frame sink unavailable: {0}")]
    SinkUnavailable(#[source] SourceError),
    #[error("no frames were selected for calibration")]
    EmptySelection,
    #[error("chessboard {pattern} was not found in any of the {frames} frames")]
    NoUsableFrames { pattern: BoardPattern, frames: usize },
    #[error("calibration failed: {0}")]
    SolverFailure(#[from] SolveError),
    #[error("invalid board: {0}")]
    InvalidBoard(#[from] BoardError),
    #[error("frame {index} is {got:?} but earlier frames are {expected:?}")]
    ImageSizeMismatch {
        index: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("frame stream failed: {0}")]
    Stream(#[from] SourceError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
