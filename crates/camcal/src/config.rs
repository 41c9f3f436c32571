//! JSON configuration for the calibrate-and-rectify pipeline.

use crate::error::ConfigError;
use crate::select::SelectOptions;
use camcal_chessboard::ChessboardParams;
use camcal_core::{BoardPattern, CameraMatrix, CellSize, Distortion};
use camcal_solve::{CalibrationResult, SolveOptions};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

fn default_cell_size() -> CellSize {
    CellSize::UNIT
}

fn default_wait_ms() -> u64 {
    10
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Inner-corner grid, `{ "cols": 10, "rows": 7 }`.
    pub pattern: BoardPattern,
    /// Square side in world units; poses come out in the same unit.
    #[serde(default = "default_cell_size")]
    pub cell_size: CellSize,
    #[serde(default)]
    pub select: SelectOptions,
    #[serde(default)]
    pub detector: ChessboardParams,
    #[serde(default)]
    pub solve: SolveOptions,
    #[serde(default)]
    pub camera_guess: Option<CameraMatrix>,
    #[serde(default)]
    pub distortion_guess: Option<Distortion>,
    /// Bounded wait per rectified frame, in milliseconds.
    #[serde(default = "default_wait_ms")]
    pub rectify_wait_ms: u64,
}

impl PipelineConfig {
    pub fn new(pattern: BoardPattern) -> Self {
        Self {
            pattern,
            cell_size: default_cell_size(),
            select: SelectOptions::default(),
            detector: ChessboardParams::default(),
            solve: SolveOptions::default(),
            camera_guess: None,
            distortion_guess: None,
            rectify_wait_ms: default_wait_ms(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Write a calibration result to disk as pretty JSON.
pub fn write_result_json(
    result: &CalibrationResult,
    path: impl AsRef<Path>,
) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(result)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a calibration result written by [`write_result_json`].
pub fn load_result_json(path: impl AsRef<Path>) -> Result<CalibrationResult, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_takes_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{ "pattern": { "cols": 9, "rows": 6 } }"#).unwrap();
        assert_eq!(cfg, PipelineConfig::new(BoardPattern::new(9, 6).unwrap()));
        assert_eq!(cfg.select.wait_ms, 10);
        assert!(!cfg.select.select_all);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let mut cfg = PipelineConfig::new(BoardPattern::new(10, 7).unwrap());
        cfg.cell_size = CellSize::new(0.025).unwrap();
        cfg.select.select_all = true;
        cfg.solve.flags.fix_k3 = true;
        cfg.camera_guess = Some(CameraMatrix::new(600.0, 600.0, 320.0, 240.0));
        cfg.write_json(&path).unwrap();
        assert_eq!(PipelineConfig::load_json(&path).unwrap(), cfg);
    }

    #[test]
    fn rejects_invalid_board() {
        let err = serde_json::from_str::<PipelineConfig>(r#"{ "pattern": { "cols": 0, "rows": 7 } }"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<PipelineConfig>(r#"{ "pattern": { "cols": 4, "rows": 4 }, "cell_size": -1.0 }"#);
        assert!(err.is_err());
        assert!(matches!(
            PipelineConfig::load_json("/nonexistent/camcal.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
