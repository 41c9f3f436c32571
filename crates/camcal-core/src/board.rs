//! Chessboard geometry: inner-corner pattern and its planar 3D points.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BoardError {
    #[error("board pattern must have at least one inner corner per axis (got {cols}x{rows})")]
    EmptyPattern { cols: u32, rows: u32 },
    #[error("board cell size must be positive and finite (got {0})")]
    InvalidCellSize(f64),
    #[error("cannot parse board pattern {0:?} (expected COLSxROWS, e.g. 10x7)")]
    Parse(String),
}

/// Number of *inner* corners of a chessboard, `(cols, rows)`.
///
/// A board with `cols x rows` inner corners has `(cols + 1) x (rows + 1)`
/// squares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BoardPatternRepr", into = "BoardPatternRepr")]
pub struct BoardPattern {
    cols: u32,
    rows: u32,
}

#[derive(Serialize, Deserialize)]
struct BoardPatternRepr {
    cols: u32,
    rows: u32,
}

impl TryFrom<BoardPatternRepr> for BoardPattern {
    type Error = BoardError;

    fn try_from(value: BoardPatternRepr) -> Result<Self, Self::Error> {
        BoardPattern::new(value.cols, value.rows)
    }
}

impl From<BoardPattern> for BoardPatternRepr {
    fn from(value: BoardPattern) -> Self {
        Self {
            cols: value.cols,
            rows: value.rows,
        }
    }
}

impl BoardPattern {
    pub fn new(cols: u32, rows: u32) -> Result<Self, BoardError> {
        if cols == 0 || rows == 0 {
            return Err(BoardError::EmptyPattern { cols, rows });
        }
        Ok(Self { cols, rows })
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of inner corners.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Raster index of the corner at `(col, row)`.
    #[inline]
    pub fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Planar 3D points `(col, row, 0) * cell_size`, row-major with the
    /// column index varying fastest.
    pub fn object_points(&self, cell_size: CellSize) -> Vec<Point3<f64>> {
        let s = cell_size.get();
        (0..self.rows)
            .flat_map(|r| (0..self.cols).map(move |c| Point3::new(c as f64 * s, r as f64 * s, 0.0)))
            .collect()
    }
}

impl fmt::Display for BoardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

impl FromStr for BoardPattern {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || BoardError::Parse(s.to_string());
        let (c, r) = s
            .split_once(['x', 'X', ','])
            .ok_or_else(parse_err)?;
        let cols = c.trim().parse::<u32>().map_err(|_| parse_err())?;
        let rows = r.trim().parse::<u32>().map_err(|_| parse_err())?;
        BoardPattern::new(cols, rows)
    }
}

/// Physical edge length of one board square (any length unit).
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CellSize(f64);

impl CellSize {
    pub const UNIT: Self = Self(1.0);

    pub fn new(value: f64) -> Result<Self, BoardError> {
        if !(value.is_finite() && value > 0.0) {
            return Err(BoardError::InvalidCellSize(value));
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for CellSize {
    type Error = BoardError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        CellSize::new(value)
    }
}

impl From<CellSize> for f64 {
    fn from(value: CellSize) -> Self {
        value.0
    }
}
