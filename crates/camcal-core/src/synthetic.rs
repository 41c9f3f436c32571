//! Synthetic chessboard views for tests, benches and demos.
//!
//! Boards are rendered by backward mapping: every (sub)pixel is undistorted,
//! cast as a ray and intersected with the board plane `Z = 0`. The board
//! carries a one-square white margin and sits on a mid-gray background.

use crate::{BoardPattern, CameraMatrix, CellSize, Distortion, Frame, GrayImage, Pose};
use nalgebra::{Matrix3, Rotation3, Vector2, Vector3};

const BLACK: f32 = 25.0;
const WHITE: f32 = 230.0;
const BACKGROUND: f32 = 128.0;

/// Camera and board used to render a set of views.
#[derive(Clone, Debug)]
pub struct SyntheticRig {
    pub pattern: BoardPattern,
    pub cell_size: CellSize,
    pub camera: CameraMatrix,
    pub distortion: Distortion,
    pub width: usize,
    pub height: usize,
    /// Subsamples per pixel axis (anti-aliasing).
    pub supersample: usize,
}

impl SyntheticRig {
    /// Rig with a camera centred on a `width x height` sensor and focal
    /// length roughly equal to the image width.
    pub fn new(pattern: BoardPattern, width: usize, height: usize) -> Self {
        let f = width as f64 * 0.95;
        Self {
            pattern,
            cell_size: CellSize::UNIT,
            camera: CameraMatrix::new(
                f,
                f,
                (width as f64 - 1.0) * 0.5 + 1.5,
                (height as f64 - 1.0) * 0.5 - 2.0,
            ),
            distortion: Distortion::zero(),
            width,
            height,
            supersample: 3,
        }
    }

    pub fn with_distortion(mut self, distortion: Distortion) -> Self {
        self.distortion = distortion;
        self
    }

    /// Distance at which the board (with margin) covers about `fill` of the
    /// image width.
    fn nominal_distance(&self, fill: f64) -> f64 {
        let span = (self.pattern.cols() as f64 + 3.0) * self.cell_size.get();
        self.camera.fx * span / (fill * self.width as f64)
    }

    /// `count` deterministic views orbiting the fronto-parallel pose.
    ///
    /// Tilts stay within 0.3 rad per axis and the in-plane roll within
    /// 0.1 rad, so board columns keep running left to right in the image.
    pub fn orbit_poses(&self, count: usize) -> Vec<Pose> {
        let s = self.cell_size.get();
        let center = Vector3::new(
            (self.pattern.cols() as f64 - 1.0) * s * 0.5,
            (self.pattern.rows() as f64 - 1.0) * s * 0.5,
            0.0,
        );
        let base = self.nominal_distance(0.6);

        (0..count)
            .map(|i| {
                let phase = i as f64 * std::f64::consts::TAU / count.max(1) as f64;
                let rot = Rotation3::from_euler_angles(
                    0.3 * phase.sin(),
                    0.3 * phase.cos(),
                    0.1 * (2.0 * phase).sin(),
                );
                let dist = base * (1.0 + 0.12 * (3.0 * phase).sin());
                let offset = Vector3::new(
                    0.06 * dist * phase.cos(),
                    0.04 * dist * phase.sin(),
                    dist,
                );
                Pose::from_rotation(&rot, offset - rot * center)
            })
            .collect()
    }

    /// Fronto-parallel view of the board centred in the image.
    pub fn frontal_pose(&self, fill: f64) -> Pose {
        let s = self.cell_size.get();
        let center = Vector3::new(
            (self.pattern.cols() as f64 - 1.0) * s * 0.5,
            (self.pattern.rows() as f64 - 1.0) * s * 0.5,
            0.0,
        );
        Pose::new(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, self.nominal_distance(fill)) - center,
        )
    }

    /// Render one grayscale view. Views with the board behind the camera
    /// render as plain background.
    pub fn render(&self, pose: &Pose) -> GrayImage {
        let rot = pose.rotation();
        let r = rot.matrix();
        let plane = Matrix3::from_columns(&[
            r.column(0).into_owned(),
            r.column(1).into_owned(),
            pose.tvec,
        ]);
        let mut out = GrayImage::new(self.width, self.height);
        let Some(to_board) = plane.try_inverse() else {
            out.data.fill(BACKGROUND as u8);
            return out;
        };

        let n = self.supersample.max(1);
        let step = 1.0 / n as f64;
        let inv_count = 1.0 / (n * n) as f32;
        let undistort = !self.distortion.is_zero();

        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0f32;
                for sy in 0..n {
                    for sx in 0..n {
                        let px = x as f64 - 0.5 + (sx as f64 + 0.5) * step;
                        let py = y as f64 - 0.5 + (sy as f64 + 0.5) * step;
                        let mut ray = Vector2::new(
                            (px - self.camera.cx) / self.camera.fx,
                            (py - self.camera.cy) / self.camera.fy,
                        );
                        if undistort {
                            ray = self.distortion.undistort(ray, 10);
                        }
                        let b = to_board * Vector3::new(ray.x, ray.y, 1.0);
                        acc += if b.z <= 0.0 {
                            BACKGROUND
                        } else {
                            self.board_intensity(b.x / b.z, b.y / b.z)
                        };
                    }
                }
                out.data[y * self.width + x] = (acc * inv_count).round() as u8;
            }
        }
        out
    }

    pub fn render_frame(&self, pose: &Pose) -> Frame {
        Frame::from_gray(self.render(pose))
    }

    /// Intensity at board-plane coordinates `(bx, by)`.
    fn board_intensity(&self, bx: f64, by: f64) -> f32 {
        let s = self.cell_size.get();
        let i = (bx / s).floor() as i64 + 1;
        let j = (by / s).floor() as i64 + 1;
        let cols = self.pattern.cols() as i64;
        let rows = self.pattern.rows() as i64;

        if (0..=cols).contains(&i) && (0..=rows).contains(&j) {
            if (i + j) % 2 == 0 {
                BLACK
            } else {
                WHITE
            }
        } else if (-1..=cols + 1).contains(&i) && (-1..=rows + 1).contains(&j) {
            WHITE
        } else {
            BACKGROUND
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_point;

    #[test]
    fn corners_land_on_checker_junctions() {
        let rig = SyntheticRig::new(BoardPattern::new(6, 4).unwrap(), 320, 240);
        let pose = rig.frontal_pose(0.6);
        let img = rig.render(&pose);
        let pts = rig.pattern.object_points(rig.cell_size);

        for p in &pts {
            let px = project_point(&rig.camera, &rig.distortion, &pose, p).unwrap();
            assert!(px.x > 5.0 && px.x < 315.0 && px.y > 5.0 && px.y < 235.0);
            // Diagonal neighbours across a junction share a color.
            let at = |dx: f64, dy: f64| {
                let x = (px.x + dx).round() as usize;
                let y = (px.y + dy).round() as usize;
                img.data[y * img.width + x] as i32
            };
            let d = 4.0;
            assert!((at(-d, -d) - at(d, d)).abs() < 10);
            assert!((at(d, -d) - at(-d, d)).abs() < 10);
            assert!((at(-d, -d) - at(d, -d)).abs() > 150);
        }
    }

    #[test]
    fn orbit_keeps_board_in_view() {
        let rig = SyntheticRig::new(BoardPattern::new(9, 6).unwrap(), 320, 240);
        let pts = rig.pattern.object_points(rig.cell_size);
        for pose in rig.orbit_poses(12) {
            for p in &pts {
                let px = project_point(&rig.camera, &rig.distortion, &pose, p).unwrap();
                assert!(px.x > 0.0 && px.x < 319.0, "{px:?}");
                assert!(px.y > 0.0 && px.y < 239.0, "{px:?}");
            }
        }
    }
}
