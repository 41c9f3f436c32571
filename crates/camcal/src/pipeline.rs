//! Select → calibrate → rectify over one reopenable frame source.

use crate::calibrate::Calibrator;
use crate::config::PipelineConfig;
use crate::display::Display;
use crate::error::PipelineError;
use crate::io::{SinkProvider, SourceProvider};
use crate::rectifier::{RectifyReport, Rectifier};
use crate::select::FrameSelector;
use camcal_chessboard::ChessboardDetector;
use camcal_solve::CalibrationResult;
use log::info;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    pub calibration: CalibrationResult,
    pub rectify: RectifyReport,
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    pub config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    fn detector(&self) -> ChessboardDetector {
        ChessboardDetector::new(self.config.detector.clone())
    }

    /// Select frames from `source` and calibrate on them.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn calibrate_from_source<P, D>(
        &self,
        source: &mut P,
        display: &mut D,
    ) -> Result<CalibrationResult, PipelineError>
    where
        P: SourceProvider,
        D: Display + ?Sized,
    {
        let cfg = &self.config;
        let frames = FrameSelector::new(cfg.pattern, cfg.select.clone())
            .with_detector(self.detector())
            .select(source, display)?;
        if frames.is_empty() {
            return Err(PipelineError::EmptySelection);
        }

        let result = Calibrator::new(cfg.pattern, cfg.cell_size)
            .with_detector(self.detector())
            .with_options(cfg.solve.clone())
            .calibrate(
                &frames,
                cfg.camera_guess.as_ref(),
                cfg.distortion_guess.as_ref(),
            )?;
        for line in result.summary().lines() {
            info!("{line}");
        }
        Ok(result)
    }

    /// Calibrate from `source`, then replay it through the rectifier into
    /// `sink`.
    pub fn run<P, K, D>(
        &self,
        source: &mut P,
        sink: &mut K,
        display: &mut D,
    ) -> Result<PipelineOutcome, PipelineError>
    where
        P: SourceProvider,
        K: SinkProvider,
        D: Display + ?Sized,
    {
        let calibration = self.calibrate_from_source(source, display)?;
        let mut rectifier = Rectifier::new(calibration.camera_matrix, calibration.distortion);
        rectifier.wait_ms = self.config.rectify_wait_ms;
        let rectify = rectifier.run(source, sink, display)?;
        Ok(PipelineOutcome {
            calibration,
            rectify,
        })
    }
}
