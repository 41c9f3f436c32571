//! ChESS corner candidates from the `chess-corners` detector.

use crate::params::ChessParams;
use camcal_core::GrayImageView;
use chess_corners::{find_chess_corners_u8, ChessConfig, CornerDescriptor};
use log::warn;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A corner candidate with sub-pixel position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub position: Point2<f32>,
    /// Raw ChESS response at the peak.
    pub strength: f32,
}

impl From<&CornerDescriptor> for Corner {
    fn from(c: &CornerDescriptor) -> Self {
        Self {
            position: Point2::new(c.x, c.y),
            strength: c.response,
        }
    }
}

/// ChESS candidates of a grayscale image, single scale.
///
/// A view whose buffer does not match its dimensions yields no candidates.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(w = img.width, h = img.height))
)]
pub fn detect_candidates(img: &GrayImageView<'_>, params: &ChessParams) -> Vec<Corner> {
    let cfg: ChessConfig = params.to_chess_config();
    match find_chess_corners_u8(img.data, img.width as u32, img.height as u32, &cfg) {
        Ok(raw) => raw.iter().map(Corner::from).collect(),
        Err(err) => {
            warn!("ChESS detection skipped: {err}");
            Vec::new()
        }
    }
}
