//! Gradient-based saddle refinement.
//!
//! At the true corner `q`, the image gradient at every nearby pixel `p` is
//! orthogonal to `p - q`. Solving `sum(g g^T) q = sum(g g^T p)` over a window
//! and iterating gives the sub-pixel location.

use crate::params::SubpixParams;
use camcal_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Window half-size for a corner whose nearest neighbour is `spacing` away.
pub fn half_window(spacing: f32, params: &SubpixParams) -> u32 {
    let hw = (spacing * 0.2).round();
    let hw = if hw.is_finite() { hw as u32 } else { 0 };
    hw.clamp(params.min_half_window, params.max_half_window.max(params.min_half_window))
}

/// Refine one corner; returns the input when the solve is ill-conditioned or
/// wanders further than the window.
pub fn refine_corner(
    img: &GrayImageView<'_>,
    start: Point2<f32>,
    half_window: u32,
    params: &SubpixParams,
) -> Point2<f32> {
    let hw = half_window as i32;
    let sigma2 = (half_window as f32).powi(2).max(1.0);
    let mut q = start.coords;

    for _ in 0..params.max_iters {
        let mut a = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();

        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let p = q + Vector2::new(dx as f32, dy as f32);
                let gx = 0.5
                    * (sample_bilinear(img, p.x + 1.0, p.y) - sample_bilinear(img, p.x - 1.0, p.y));
                let gy = 0.5
                    * (sample_bilinear(img, p.x, p.y + 1.0) - sample_bilinear(img, p.x, p.y - 1.0));
                let wgt = (-((dx * dx + dy * dy) as f32) / sigma2).exp();

                let gxx = wgt * gx * gx;
                let gxy = wgt * gx * gy;
                let gyy = wgt * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b.x += gxx * p.x + gxy * p.y;
                b.y += gxy * p.x + gyy * p.y;
            }
        }

        let det = a.determinant();
        if !det.is_finite() || det.abs() < 1e-6 * (a.trace() * a.trace()).max(1e-12) {
            return start;
        }
        let Some(inv) = a.try_inverse() else {
            return start;
        };
        let next = inv * b;
        let moved = (next - q).norm();
        q = next;
        if moved < params.epsilon {
            break;
        }
    }

    if !(q.x.is_finite() && q.y.is_finite()) || (q - start.coords).norm() > half_window as f32 {
        return start;
    }
    Point2::from(q)
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, points, spacing, params), fields(n = points.len()))
)]
pub fn refine_corners(
    img: &GrayImageView<'_>,
    points: &mut [Point2<f32>],
    spacing: &[f32],
    params: &SubpixParams,
) {
    for (p, &s) in points.iter_mut().zip(spacing) {
        *p = refine_corner(img, *p, half_window(s, params), params);
    }
}
