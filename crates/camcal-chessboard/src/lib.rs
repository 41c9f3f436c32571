//! Chessboard inner-corner detection.
//!
//! Pipeline:
//! 1. ChESS corner candidates from the `chess-corners` detector ([`corners`]),
//! 2. seeded lattice growth and canonical ordering ([`grid`]),
//! 3. gradient-based sub-pixel refinement ([`subpix`]).
//!
//! ```no_run
//! use camcal_chessboard::ChessboardDetector;
//! use camcal_core::{BoardPattern, GrayImage};
//!
//! let img = GrayImage::new(640, 480);
//! let pattern = BoardPattern::new(10, 7).unwrap();
//! match ChessboardDetector::default().detect(&img.view(), pattern) {
//!     Some(corners) => println!("found {} corners", corners.len()),
//!     None => println!("board not found"),
//! }
//! ```

pub mod corners;
mod detector;
pub mod grid;
mod params;
pub mod subpix;

pub use corners::Corner;
pub use detector::{find_chessboard_corners, ChessboardDetector};
pub use grid::OrderedGrid;
pub use params::{ChessParams, ChessboardParams, GridParams, SubpixParams};
