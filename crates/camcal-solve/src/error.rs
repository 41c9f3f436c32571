#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SolveError {
    #[error("no views to calibrate from")]
    NoViews,
    #[error("view {view}: {objects} object points but {images} image points")]
    ViewMismatch {
        view: usize,
        objects: usize,
        images: usize,
    },
    #[error("view {view}: at least 4 correspondences required (got {got})")]
    TooFewPoints { view: usize, got: usize },
    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: usize, height: usize },
    #[error("invalid initial camera guess: {0}")]
    InvalidGuess(&'static str),
    #[error("view {0}: degenerate board homography")]
    DegenerateView(usize),
    #[error("optimisation diverged to a non-finite or non-physical solution")]
    NonFinite,
}
