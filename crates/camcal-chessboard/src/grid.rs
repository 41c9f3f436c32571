//! Seeded lattice growth over corner candidates.
//!
//! Starting from a strong seed with two roughly orthogonal neighbour axes,
//! the lattice is grown breadth-first. Each missing node is predicted from
//! already labelled nodes (collinear extrapolation, then the step of an
//! adjacent row, then the seed axes) and claimed by the nearest candidate
//! within a radius proportional to the local step.
//!
//! A lattice is accepted only when it covers exactly the requested
//! `cols x rows` inner corners. It is then relabelled so that row-major
//! indices match the board's object points.

use crate::corners::Corner;
use crate::params::GridParams;
use camcal_core::BoardPattern;
use kiddo::{KdTree, SquaredEuclidean};
use log::debug;
use nalgebra::{Point2, Vector2};
use std::collections::{HashMap, VecDeque};

#[cfg(feature = "tracing")]
use tracing::instrument;

const DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Fully labelled board, ordered like [`BoardPattern::object_points`].
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedGrid {
    pub points: Vec<Point2<f32>>,
    /// Distance from each point to its nearest lattice neighbour.
    pub spacing: Vec<f32>,
}

#[derive(Clone, Copy, Debug)]
struct SeedAxes {
    u: Vector2<f32>,
    v: Vector2<f32>,
}

struct Lattice {
    nodes: HashMap<(i32, i32), usize>,
    owner: Vec<Option<(i32, i32)>>,
}

/// Find the `pattern` lattice among `corners`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(corners, params), fields(n = corners.len(), %pattern))
)]
pub fn assemble_grid(
    corners: &[Corner],
    pattern: BoardPattern,
    params: &GridParams,
) -> Option<OrderedGrid> {
    let needed = pattern.corner_count();
    if corners.len() < needed {
        debug!(
            "only {} corner candidates for a {} board ({} needed)",
            corners.len(),
            pattern,
            needed
        );
        return None;
    }

    let coords: Vec<[f32; 2]> = corners
        .iter()
        .map(|c| [c.position.x, c.position.y])
        .collect();
    let tree: KdTree<f32, 2> = (&coords).into();

    let mut order: Vec<usize> = (0..corners.len()).collect();
    order.sort_by(|&a, &b| {
        corners[b]
            .strength
            .total_cmp(&corners[a].strength)
            .then(a.cmp(&b))
    });

    for (attempt, &seed) in order.iter().take(params.max_seeds).enumerate() {
        let Some(axes) = seed_axes(&tree, &coords, seed, params) else {
            continue;
        };
        let Some(lattice) = grow(&tree, &coords, seed, axes, pattern, params) else {
            continue;
        };
        if let Some(grid) = order_lattice(&lattice, &coords, pattern) {
            debug!("board {} assembled from seed #{} ({})", pattern, attempt, seed);
            return Some(grid);
        }
    }

    debug!("no complete {} lattice found", pattern);
    None
}

#[inline]
fn point(coords: &[[f32; 2]], i: usize) -> Vector2<f32> {
    Vector2::new(coords[i][0], coords[i][1])
}

fn seed_axes(
    tree: &KdTree<f32, 2>,
    coords: &[[f32; 2]],
    seed: usize,
    params: &GridParams,
) -> Option<SeedAxes> {
    let p = point(coords, seed);
    let neighbours: Vec<Vector2<f32>> = tree
        .nearest_n::<SquaredEuclidean>(&coords[seed], params.k_neighbors + 1)
        .into_iter()
        .map(|nn| nn.item as usize)
        .filter(|&i| i != seed)
        .map(|i| point(coords, i) - p)
        .filter(|d| d.norm() >= params.min_spacing_pix)
        .collect();

    let u = *neighbours.first()?;
    let u_len = u.norm();
    let v = neighbours[1..]
        .iter()
        .copied()
        .find(|d| {
            let d_len = d.norm();
            let cos = (u.dot(d) / (u_len * d_len)).abs();
            let ratio = d_len.max(u_len) / d_len.min(u_len);
            cos < params.max_axis_cos && ratio < params.max_axis_ratio
        })
        // Single-row boards have no second axis; growth along it then
        // finds nothing and the extent check decides.
        .unwrap_or_else(|| Vector2::new(-u.y, u.x));

    Some(SeedAxes { u, v })
}

fn grow(
    tree: &KdTree<f32, 2>,
    coords: &[[f32; 2]],
    seed: usize,
    axes: SeedAxes,
    pattern: BoardPattern,
    params: &GridParams,
) -> Option<Lattice> {
    let limit = pattern.cols().max(pattern.rows()) as i32;
    let mut lattice = Lattice {
        nodes: HashMap::new(),
        owner: vec![None; coords.len()],
    };
    lattice.nodes.insert((0, 0), seed);
    lattice.owner[seed] = Some((0, 0));

    let (mut min_i, mut max_i, mut min_j, mut max_j) = (0, 0, 0, 0);
    let mut queue = VecDeque::from([(0i32, 0i32)]);

    while let Some((i, j)) = queue.pop_front() {
        for (di, dj) in DIRS {
            let next = (i + di, j + dj);
            if lattice.nodes.contains_key(&next) {
                continue;
            }
            let (pred, step) = predict(&lattice, coords, (i, j), (di, dj), axes);
            let radius = params.search_ratio * step.norm();
            if radius <= 0.0 {
                continue;
            }

            let nn = tree.nearest_one::<SquaredEuclidean>(&[pred.x, pred.y]);
            let cand = nn.item as usize;
            if nn.distance > radius * radius || lattice.owner[cand].is_some() {
                continue;
            }

            min_i = min_i.min(next.0);
            max_i = max_i.max(next.0);
            min_j = min_j.min(next.1);
            max_j = max_j.max(next.1);
            if max_i - min_i + 1 > limit || max_j - min_j + 1 > limit {
                return None;
            }

            lattice.nodes.insert(next, cand);
            lattice.owner[cand] = Some(next);
            queue.push_back(next);
        }
    }

    Some(lattice)
}

/// Predicted position of `from + dir` and the lattice step used for it.
fn predict(
    lattice: &Lattice,
    coords: &[[f32; 2]],
    from: (i32, i32),
    dir: (i32, i32),
    axes: SeedAxes,
) -> (Vector2<f32>, Vector2<f32>) {
    let at = |k: (i32, i32)| lattice.nodes.get(&k).map(|&idx| point(coords, idx));
    let Some(p) = at(from) else {
        return (Vector2::zeros(), Vector2::zeros());
    };
    let (di, dj) = dir;

    if let Some(back) = at((from.0 - di, from.1 - dj)) {
        let step = p - back;
        return (p + step, step);
    }

    for (oi, oj) in [(dj, di), (-dj, -di)] {
        let side = at((from.0 + oi, from.1 + oj));
        let side_next = at((from.0 + oi + di, from.1 + oj + dj));
        if let (Some(a), Some(b)) = (side, side_next) {
            let step = b - a;
            return (p + step, step);
        }
    }

    let step = match dir {
        (1, 0) => axes.u,
        (-1, 0) => -axes.u,
        (0, 1) => axes.v,
        _ => -axes.v,
    };
    (p + step, step)
}

/// Relabel a complete lattice into board order, or `None` when it does not
/// match the pattern.
fn order_lattice(
    lattice: &Lattice,
    coords: &[[f32; 2]],
    pattern: BoardPattern,
) -> Option<OrderedGrid> {
    let cols = pattern.cols() as i32;
    let rows = pattern.rows() as i32;
    if lattice.nodes.len() != pattern.corner_count() {
        return None;
    }

    let min_i = lattice.nodes.keys().map(|k| k.0).min()?;
    let max_i = lattice.nodes.keys().map(|k| k.0).max()?;
    let min_j = lattice.nodes.keys().map(|k| k.1).min()?;
    let max_j = lattice.nodes.keys().map(|k| k.1).max()?;
    let (w, h) = (max_i - min_i + 1, max_j - min_j + 1);

    let mut best: Option<(f32, Vec<usize>)> = None;
    for swap in [false, true] {
        let (ew, eh) = if swap { (h, w) } else { (w, h) };
        if (ew, eh) != (cols, rows) {
            continue;
        }
        for flip_c in [false, true] {
            for flip_r in [false, true] {
                let mut indices = vec![usize::MAX; pattern.corner_count()];
                for (&(i, j), &idx) in &lattice.nodes {
                    let (a, b) = if swap {
                        (j - min_j, i - min_i)
                    } else {
                        (i - min_i, j - min_j)
                    };
                    let col = if flip_c { cols - 1 - a } else { a };
                    let row = if flip_r { rows - 1 - b } else { b };
                    indices[pattern.index(col as u32, row as u32)] = idx;
                }
                if indices.contains(&usize::MAX) {
                    continue;
                }

                let (col_dir, row_dir) = board_axes(&indices, coords, pattern);
                let cross = col_dir.x * row_dir.y - col_dir.y * row_dir.x;
                if cross <= 0.0 {
                    continue;
                }
                let score = col_dir.x / col_dir.norm();
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((score, indices));
                }
            }
        }
    }

    let (_, indices) = best?;
    let points: Vec<Point2<f32>> = indices
        .iter()
        .map(|&i| Point2::new(coords[i][0], coords[i][1]))
        .collect();
    let spacing = neighbour_spacing(&points, pattern);
    Some(OrderedGrid { points, spacing })
}

/// Mean column and row steps of an ordered lattice. Degenerate axes of
/// single-row or single-column boards are completed by a right-handed
/// perpendicular.
fn board_axes(
    indices: &[usize],
    coords: &[[f32; 2]],
    pattern: BoardPattern,
) -> (Vector2<f32>, Vector2<f32>) {
    let (cols, rows) = (pattern.cols(), pattern.rows());
    let at = |c: u32, r: u32| point(coords, indices[pattern.index(c, r)]);

    let mut col_dir = Vector2::zeros();
    let mut row_dir = Vector2::zeros();
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                col_dir += at(c + 1, r) - at(c, r);
            }
            if r + 1 < rows {
                row_dir += at(c, r + 1) - at(c, r);
            }
        }
    }

    match (cols > 1, rows > 1) {
        (true, false) => row_dir = Vector2::new(-col_dir.y, col_dir.x),
        (false, true) => col_dir = Vector2::new(row_dir.y, -row_dir.x),
        (false, false) => {
            col_dir = Vector2::x();
            row_dir = Vector2::y();
        }
        (true, true) => {}
    }
    (col_dir, row_dir)
}

fn neighbour_spacing(points: &[Point2<f32>], pattern: BoardPattern) -> Vec<f32> {
    let (cols, rows) = (pattern.cols() as i64, pattern.rows() as i64);
    let mut out = Vec::with_capacity(points.len());
    for r in 0..rows {
        for c in 0..cols {
            let p = points[pattern.index(c as u32, r as u32)];
            let d = DIRS
                .iter()
                .filter_map(|&(dc, dr)| {
                    let (nc, nr) = (c + dc as i64, r + dr as i64);
                    ((0..cols).contains(&nc) && (0..rows).contains(&nr))
                        .then(|| (points[pattern.index(nc as u32, nr as u32)] - p).norm())
                })
                .fold(f32::INFINITY, f32::min);
            out.push(d);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice_corners(
        cols: u32,
        rows: u32,
        origin: Vector2<f32>,
        u: Vector2<f32>,
        v: Vector2<f32>,
    ) -> Vec<Corner> {
        let mut out = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let p = origin + u * c as f32 + v * r as f32;
                out.push(Corner {
                    position: Point2::new(p.x, p.y),
                    strength: 100.0 + (c * 7 + r * 3) as f32,
                });
            }
        }
        out
    }

    fn pattern(c: u32, r: u32) -> BoardPattern {
        BoardPattern::new(c, r).unwrap()
    }

    #[test]
    fn orders_axis_aligned_board_row_major() {
        let corners = lattice_corners(
            5,
            4,
            Vector2::new(50.0, 40.0),
            Vector2::new(20.0, 0.0),
            Vector2::new(0.0, 20.0),
        );
        let grid = assemble_grid(&corners, pattern(5, 4), &GridParams::default()).unwrap();
        assert_eq!(grid.points.len(), 20);
        for r in 0..4 {
            for c in 0..5 {
                let p = grid.points[r * 5 + c];
                assert_eq!(p, Point2::new(50.0 + 20.0 * c as f32, 40.0 + 20.0 * r as f32));
            }
        }
        assert!(grid.spacing.iter().all(|&s| (s - 20.0).abs() < 1e-4));
    }

    #[test]
    fn relabels_rotated_and_shuffled_input() {
        // Board rotated by 180 degrees: raster order of the input runs backwards.
        let mut corners = lattice_corners(
            6,
            3,
            Vector2::new(200.0, 120.0),
            Vector2::new(-18.0, 1.0),
            Vector2::new(-1.0, -18.0),
        );
        corners.reverse();
        corners.swap(3, 11);
        let grid = assemble_grid(&corners, pattern(6, 3), &GridParams::default()).unwrap();
        let first = grid.points[0];
        let next = grid.points[1];
        let below = grid.points[6];
        assert!(next.x > first.x, "columns must run left to right");
        assert!(below.y > first.y, "rows must run downwards");
    }

    #[test]
    fn accepts_transposed_layout() {
        // 4 wide and 6 tall in the image, requested as 6x4.
        let corners = lattice_corners(
            4,
            6,
            Vector2::new(30.0, 30.0),
            Vector2::new(15.0, 0.0),
            Vector2::new(0.0, 15.0),
        );
        let grid = assemble_grid(&corners, pattern(6, 4), &GridParams::default()).unwrap();
        assert_eq!(grid.points.len(), 24);
        let col_step = grid.points[1] - grid.points[0];
        let row_step = grid.points[6] - grid.points[0];
        assert!(col_step.x * row_step.y - col_step.y * row_step.x > 0.0);
    }

    #[test]
    fn rejects_missing_or_wrong_size() {
        let mut corners = lattice_corners(
            5,
            4,
            Vector2::new(50.0, 40.0),
            Vector2::new(20.0, 0.0),
            Vector2::new(0.0, 20.0),
        );
        assert!(assemble_grid(&corners, pattern(6, 4), &GridParams::default()).is_none());
        assert!(assemble_grid(&corners, pattern(4, 4), &GridParams::default()).is_none());
        corners.remove(7);
        corners.push(Corner {
            position: Point2::new(400.0, 300.0),
            strength: 50.0,
        });
        assert!(assemble_grid(&corners, pattern(5, 4), &GridParams::default()).is_none());
    }

    #[test]
    fn ignores_clutter_outside_the_board() {
        let mut corners = lattice_corners(
            4,
            3,
            Vector2::new(100.0, 100.0),
            Vector2::new(25.0, 3.0),
            Vector2::new(-3.0, 25.0),
        );
        corners.push(Corner {
            position: Point2::new(10.0, 10.0),
            strength: 500.0,
        });
        corners.push(Corner {
            position: Point2::new(300.0, 20.0),
            strength: 400.0,
        });
        let grid = assemble_grid(&corners, pattern(4, 3), &GridParams::default()).unwrap();
        assert_eq!(grid.points[0], Point2::new(100.0, 100.0));
    }
}
