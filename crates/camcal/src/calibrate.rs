use crate::error::PipelineError;
use camcal_chessboard::ChessboardDetector;
use camcal_core::{BoardPattern, CameraMatrix, CellSize, Distortion, Frame};
use camcal_solve::{calibrate_camera, CalibrationResult, PlanarView, SolveOptions};
use log::{debug, info, warn};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Detects the board in a set of frames and solves for the camera.
#[derive(Clone, Debug)]
pub struct Calibrator {
    pub pattern: BoardPattern,
    pub cell_size: CellSize,
    pub detector: ChessboardDetector,
    pub options: SolveOptions,
}

impl Calibrator {
    pub fn new(pattern: BoardPattern, cell_size: CellSize) -> Self {
        Self {
            pattern,
            cell_size,
            detector: ChessboardDetector::default(),
            options: SolveOptions::default(),
        }
    }

    pub fn with_detector(mut self, detector: ChessboardDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_options(mut self, options: SolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Calibrate from `images`; frames where the board is not found are
    /// skipped. `used_frames` in the result indexes `images`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(frames = images.len(), pattern = %self.pattern))
    )]
    pub fn calibrate(
        &self,
        images: &[Frame],
        camera: Option<&CameraMatrix>,
        distortion: Option<&Distortion>,
    ) -> Result<CalibrationResult, PipelineError> {
        let object = self.pattern.object_points(self.cell_size);
        let mut views = Vec::new();
        let mut used = Vec::new();
        let mut image_size: Option<(usize, usize)> = None;

        for (index, frame) in images.iter().enumerate() {
            let Some(corners) = self.detector.detect_frame(frame, self.pattern) else {
                debug!("frame {index}: board not found, skipped");
                continue;
            };
            match image_size {
                None => image_size = Some(frame.size()),
                Some(expected) if expected != frame.size() => {
                    return Err(PipelineError::ImageSizeMismatch {
                        index,
                        expected,
                        got: frame.size(),
                    });
                }
                Some(_) => {}
            }
            let image = corners
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect();
            views.push(PlanarView::new(object.clone(), image));
            used.push(index);
        }

        let Some(image_size) = image_size else {
            return Err(PipelineError::NoUsableFrames {
                pattern: self.pattern,
                frames: images.len(),
            });
        };
        if used.len() < images.len() {
            warn!(
                "board found in {} of {} frames; the rest are ignored",
                used.len(),
                images.len()
            );
        }

        let mut result = calibrate_camera(&views, image_size, camera, distortion, &self.options)?;
        result.used_frames = used;
        info!(
            "calibrated from {} views: rms {:.4} px",
            result.used_frames.len(),
            result.rms
        );
        Ok(result)
    }
}

/// One-shot calibration of `images` with default detector parameters.
pub fn calibrate(
    images: &[Frame],
    pattern: BoardPattern,
    cell_size: CellSize,
    camera: Option<&CameraMatrix>,
    distortion: Option<&Distortion>,
    options: &SolveOptions,
) -> Result<CalibrationResult, PipelineError> {
    Calibrator::new(pattern, cell_size)
        .with_options(options.clone())
        .calibrate(images, camera, distortion)
}
