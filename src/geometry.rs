//! Planar points and the digital line walk through a cell grid.

use serde::{Deserialize, Serialize};

/// Point in the floor plane, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Shape of a regular grid of square cells anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    pub n_cols: usize,
    pub n_rows: usize,
    pub resolution: f64,
}

impl CellGrid {
    /// Cell containing `pos`, clamped to the grid so that points on the far
    /// edges belong to the last row/column.
    pub fn cell_of(&self, pos: Point) -> (usize, usize) {
        (
            clamp_index(pos.x / self.resolution, self.n_cols),
            clamp_index(pos.y / self.resolution, self.n_rows),
        )
    }
}

fn clamp_index(coord: f64, n: usize) -> usize {
    let idx = coord.floor();
    if idx <= 0.0 {
        0
    } else {
        (idx as usize).min(n.saturating_sub(1))
    }
}

/// Cell crossed by a segment and the length of the segment inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellCrossing {
    pub col: usize,
    pub row: usize,
    pub length: f64,
}

/// Straight line of sight between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn length(&self) -> f64 {
        self.from.distance(self.to)
    }

    /// Cells crossed by the segment, in order from `from` to `to`.
    ///
    /// Uses the Amanatides-Woo traversal: the parameter `t` along the segment
    /// advances to the nearest vertical or horizontal cell boundary at each
    /// step. Lengths sum to the segment length. Both endpoints must lie inside
    /// the grid extent.
    pub fn crossings(&self, grid: &CellGrid) -> Vec<CellCrossing> {
        let mut crossings = Vec::new();
        let len = self.length();
        if len <= 0.0 || grid.n_cols == 0 || grid.n_rows == 0 {
            return crossings;
        }

        let dx = self.to.x - self.from.x;
        let dy = self.to.y - self.from.y;
        let res = grid.resolution;

        let (mut col, mut row) = grid.cell_of(self.from);
        let (end_col, end_row) = grid.cell_of(self.to);

        let (step_col, mut t_max_x, t_delta_x) = axis_setup(self.from.x, dx, col, res);
        let (step_row, mut t_max_y, t_delta_y) = axis_setup(self.from.y, dy, row, res);

        let max_steps = grid.n_cols + grid.n_rows + 2;
        let mut t = 0.0;
        for _ in 0..max_steps {
            if t >= 1.0 || (col == end_col && row == end_row) {
                break;
            }

            let t_next = t_max_x.min(t_max_y).min(1.0);
            if t_next > t {
                crossings.push(CellCrossing {
                    col,
                    row,
                    length: (t_next - t) * len,
                });
                t = t_next;
            }
            if t >= 1.0 {
                break;
            }

            // A tie means the segment passes exactly through a cell corner.
            let cross_x = t_max_x <= t_max_y;
            let cross_y = t_max_y <= t_max_x;
            if cross_x {
                match step(col, step_col, grid.n_cols) {
                    Some(next) => col = next,
                    None => break,
                }
                t_max_x += t_delta_x;
            }
            if cross_y {
                match step(row, step_row, grid.n_rows) {
                    Some(next) => row = next,
                    None => break,
                }
                t_max_y += t_delta_y;
            }
        }

        // The last cell holds whatever is left of the segment.
        if t < 1.0 {
            crossings.push(CellCrossing {
                col,
                row,
                length: (1.0 - t) * len,
            });
        }

        crossings
    }
}

/// Step direction, parameter of the first boundary, and parameter spacing of
/// boundaries along one axis.
fn axis_setup(origin: f64, delta: f64, idx: usize, res: f64) -> (isize, f64, f64) {
    if delta > 0.0 {
        let boundary = (idx + 1) as f64 * res;
        (1, (boundary - origin) / delta, res / delta)
    } else if delta < 0.0 {
        let boundary = idx as f64 * res;
        (-1, (boundary - origin) / delta, -res / delta)
    } else {
        (0, f64::INFINITY, f64::INFINITY)
    }
}

fn step(idx: usize, dir: isize, n: usize) -> Option<usize> {
    let next = idx.checked_add_signed(dir)?;
    (next < n).then_some(next)
}
