use crate::corners::{detect_candidates, Corner};
use crate::grid::assemble_grid;
use crate::params::ChessboardParams;
use crate::subpix::refine_corners;
use camcal_core::{BoardPattern, Frame, GrayImageView};
use log::debug;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Inner-corner detector for a chessboard of known size.
///
/// Detection is a pure function of the image and the parameters: the same
/// input always produces the same corners, and the input is never modified.
#[derive(Clone, Debug, Default)]
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// ChESS corner candidates of a grayscale image.
    pub fn find_corners(&self, img: &GrayImageView<'_>) -> Vec<Corner> {
        detect_candidates(img, &self.params.chess)
    }

    /// Locate all `cols x rows` inner corners of `pattern`.
    ///
    /// Returns the corners in row-major order (column index fastest), the
    /// same order as [`BoardPattern::object_points`], or `None` when the
    /// full board cannot be located.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(w = img.width, h = img.height, %pattern))
    )]
    pub fn detect(
        &self,
        img: &GrayImageView<'_>,
        pattern: BoardPattern,
    ) -> Option<Vec<Point2<f32>>> {
        let corners = self.find_corners(img);
        debug!("{} ChESS candidates", corners.len());

        let grid = assemble_grid(&corners, pattern, &self.params.grid)?;
        let mut points = grid.points;
        if self.params.subpix.enabled {
            refine_corners(img, &mut points, &grid.spacing, &self.params.subpix);
        }
        Some(points)
    }

    /// [`ChessboardDetector::detect`] on a frame of any channel count; color
    /// frames are reduced to luma first.
    pub fn detect_frame(&self, frame: &Frame, pattern: BoardPattern) -> Option<Vec<Point2<f32>>> {
        let gray = frame.to_gray();
        self.detect(&gray.view(), pattern)
    }
}

/// Detect `pattern` in `frame` with default parameters.
pub fn find_chessboard_corners(frame: &Frame, pattern: BoardPattern) -> Option<Vec<Point2<f32>>> {
    ChessboardDetector::default().detect_frame(frame, pattern)
}
