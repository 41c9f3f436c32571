//! Undistortion maps and bilinear remapping.
//!
//! The map stores, for every pixel of the corrected image, the position in
//! the distorted source image to sample from. The corrected image keeps the
//! input camera matrix and an identity rectification rotation.

use crate::{CameraMatrix, Distortion, Frame};
use nalgebra::Vector2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-pixel source coordinates (`map_x`, `map_y`), row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct UndistortMap {
    pub width: usize,
    pub height: usize,
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl UndistortMap {
    /// Build the map for a `width x height` target.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(k, dist), fields(width, height))
    )]
    pub fn new(k: &CameraMatrix, dist: &Distortion, width: usize, height: usize) -> Self {
        let mut map_x = Vec::with_capacity(width * height);
        let mut map_y = Vec::with_capacity(width * height);

        for v in 0..height {
            let y = (v as f64 - k.cy) / k.fy;
            for u in 0..width {
                let x = (u as f64 - k.cx) / k.fx;
                let src = k.normalized_to_pixel(dist.distort(Vector2::new(x, y)));
                map_x.push(src.x as f32);
                map_y.push(src.y as f32);
            }
        }

        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn source_of(&self, x: usize, y: usize) -> (f32, f32) {
        let i = y * self.width + x;
        (self.map_x[i], self.map_y[i])
    }
}

/// Resample `src` through `map` with bilinear interpolation.
///
/// Samples that fall outside the source read as 0 (constant border). The
/// output has the map's size and the source's channel count.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, map), fields(width = map.width, height = map.height))
)]
pub fn remap_bilinear(src: &Frame, map: &UndistortMap) -> Frame {
    let ch = src.channels();
    let mut data = vec![0u8; map.width * map.height * ch];
    let mut acc = [0.0f32; 4];

    for (i, (&sx, &sy)) in map.map_x.iter().zip(&map.map_y).enumerate() {
        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        acc[..ch].fill(0.0);
        let taps = [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x0 + 1, y0, fx * (1.0 - fy)),
            (x0, y0 + 1, (1.0 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];
        for (x, y, w) in taps {
            if w == 0.0 || x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
                continue;
            }
            let px = src.pixel(x as usize, y as usize);
            for c in 0..ch {
                acc[c] += w * px[c] as f32;
            }
        }

        for c in 0..ch {
            data[i * ch + c] = acc[c].round().clamp(0.0, 255.0) as u8;
        }
    }

    Frame::from_parts(map.width, map.height, ch, data)
}
