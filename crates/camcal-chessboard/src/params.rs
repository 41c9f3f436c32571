use chess_corners::{ChessConfig, DetectorMode, ThresholdMode};
use serde::{Deserialize, Serialize};

/// ChESS candidate parameters, mapped onto the `chess-corners` config.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessParams {
    /// Sampling ring radius in pixels (5 or 10).
    pub ring_radius: u32,
    /// Threshold relative to the strongest response in the image.
    pub threshold_rel: f32,
    /// Absolute threshold; overrides `threshold_rel` when set.
    pub threshold_abs: Option<f32>,
    /// Half-size of the non-maximum suppression window.
    pub nms_radius: u32,
    /// Minimal number of positive responses around a peak.
    pub min_cluster_size: u32,
}

impl Default for ChessParams {
    fn default() -> Self {
        Self {
            ring_radius: 5,
            threshold_rel: 0.2,
            threshold_abs: None,
            nms_radius: 2,
            min_cluster_size: 2,
        }
    }
}

impl ChessParams {
    /// Single-scale detector config. A ring radius of 10 or more selects
    /// the broad kernel.
    pub fn to_chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.detector_mode = if self.ring_radius >= 10 {
            DetectorMode::Broad
        } else {
            DetectorMode::Canonical
        };
        match self.threshold_abs {
            Some(abs) => {
                cfg.threshold_mode = ThresholdMode::Absolute;
                cfg.threshold_value = abs;
            }
            None => {
                cfg.threshold_mode = ThresholdMode::Relative;
                cfg.threshold_value = self.threshold_rel;
            }
        }
        cfg.nms_radius = self.nms_radius;
        cfg.min_cluster_size = self.min_cluster_size;
        cfg
    }
}

/// Lattice growth parameters.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridParams {
    /// How many of the strongest corners are tried as growth seeds.
    pub max_seeds: usize,
    /// Neighbours examined when choosing the two seed axes.
    pub k_neighbors: usize,
    /// Search radius around a predicted position, relative to the local
    /// lattice step.
    pub search_ratio: f32,
    /// Maximal |cos| between the two seed axes.
    pub max_axis_cos: f32,
    /// Maximal length ratio between the two seed axes.
    pub max_axis_ratio: f32,
    /// Minimal lattice step in pixels.
    pub min_spacing_pix: f32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            max_seeds: 25,
            k_neighbors: 8,
            search_ratio: 0.35,
            max_axis_cos: 0.5,
            max_axis_ratio: 2.5,
            min_spacing_pix: 4.0,
        }
    }
}

/// Gradient-based saddle refinement parameters.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubpixParams {
    pub enabled: bool,
    /// Bounds of the window half-size; the actual size follows the local
    /// lattice step.
    pub min_half_window: u32,
    pub max_half_window: u32,
    pub max_iters: usize,
    /// Stop when an update moves the corner less than this (pixels).
    pub epsilon: f32,
}

impl Default for SubpixParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_half_window: 2,
            max_half_window: 5,
            max_iters: 20,
            epsilon: 0.01,
        }
    }
}

/// Parameters of the full chessboard detector.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    pub chess: ChessParams,
    pub grid: GridParams,
    pub subpix: SubpixParams,
}
