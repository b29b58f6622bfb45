//! Building layout: a material grid over the floor plus the access points.

use crate::attenuation::attenuation_db;
use crate::error::{Error, Result};
use crate::geometry::{CellGrid, Point};
use crate::material::{Material, MaterialCatalog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum number of access points per run.
pub const MAX_ACCESS_POINTS: usize = 4;

/// Maximum number of material cells of a layout.
pub const MAX_CELLS: usize = 4_000_000;

pub const DEFAULT_TX_POWER_DBM: f64 = 20.0;
pub const DEFAULT_FREQUENCY_GHZ: f64 = 2.4;

/// WiFi access point placed on the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub id: String,
    pub position: Point,
    pub tx_power_dbm: f64,
    pub frequency_ghz: f64,
    pub channel: Option<u32>,
}

impl AccessPoint {
    /// Access point with the default transmit power and frequency.
    pub fn new(id: &str, position: Point) -> Self {
        Self {
            id: id.to_string(),
            position,
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
            frequency_ghz: DEFAULT_FREQUENCY_GHZ,
            channel: None,
        }
    }

    pub fn with_tx_power(mut self, tx_power_dbm: f64) -> Self {
        self.tx_power_dbm = tx_power_dbm;
        self
    }

    pub fn with_frequency(mut self, frequency_ghz: f64) -> Self {
        self.frequency_ghz = frequency_ghz;
        self
    }

    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }
}

/// Axis-aligned rectangle with its lower-left corner at (`x`, `y`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// Share of a wall occupying one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occupant {
    /// Catalog index of the material.
    pub material: usize,
    /// Physical thickness of the whole wall, in meters.
    pub thickness: f64,
    /// Fraction of the wall's thickness lying inside this cell.
    pub share: f64,
}

impl Occupant {
    /// Loss of a perpendicular crossing of this cell's share of the wall.
    ///
    /// The shares of one wall add up to the loss of the whole wall, so
    /// capped materials are capped once per wall rather than once per cell.
    pub fn loss_db(&self, material: &Material, frequency_ghz: f64) -> f64 {
        attenuation_db(material, self.thickness, frequency_ghz) * self.share
    }
}

/// Mutable layout under construction.
///
/// Cells only ever gain occupants. [`LayoutBuilder::build`] freezes the
/// result into a [`BuildingLayout`].
pub struct LayoutBuilder {
    width: f64,
    height: f64,
    grid: CellGrid,
    catalog: Arc<MaterialCatalog>,
    cells: Vec<Vec<Occupant>>,
    access_points: Vec<AccessPoint>,
}

impl LayoutBuilder {
    pub fn new(
        width: f64,
        height: f64,
        resolution: f64,
        catalog: Arc<MaterialCatalog>,
    ) -> Result<Self> {
        for (name, val) in [("width", width), ("height", height), ("resolution", resolution)] {
            if !(val > 0.0 && val.is_finite()) {
                return Err(Error::invalid_config(format!(
                    "layout {name} must be positive, but is {val}"
                )));
            }
        }
        if resolution > width.min(height) {
            return Err(Error::invalid_config(format!(
                "resolution {resolution} exceeds the layout extent {width} x {height}"
            )));
        }

        let n_cols = ((width / resolution).round() as usize).max(1);
        let n_rows = ((height / resolution).round() as usize).max(1);
        let n_cells = n_cols
            .checked_mul(n_rows)
            .filter(|&n_cells| n_cells <= MAX_CELLS)
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "layout {width} x {height} at resolution {resolution} needs more than \
                     {MAX_CELLS} cells"
                ))
            })?;

        let grid = CellGrid {
            n_cols,
            n_rows,
            resolution,
        };
        let cells = vec![Vec::new(); n_cells];

        Ok(Self {
            width,
            height,
            grid,
            catalog,
            cells,
            access_points: Vec::new(),
        })
    }

    /// Rasterise a wall of `material` covering `rect`.
    ///
    /// Each cell spanning the rectangle's narrow side holds an equal share of
    /// the wall's physical thickness (default: the material's reference
    /// thickness), so a line of sight crossing the wall perpendicularly pays
    /// the loss of the whole wall exactly once. Parts outside the layout are
    /// clipped.
    pub fn add_wall(&mut self, material: &str, rect: Rect, thickness: Option<f64>) -> Result<()> {
        let idx = self.catalog.index_of(material)?;
        let thickness = match thickness {
            Some(thickness) => thickness,
            None => self.catalog.get(idx).map_or(0.0, |mat| mat.thickness),
        };
        if !(thickness > 0.0 && thickness.is_finite()) {
            return Err(Error::invalid_config(format!(
                "wall thickness must be positive, but is {thickness}"
            )));
        }
        if !(rect.w > 0.0 && rect.h > 0.0 && rect.x.is_finite() && rect.y.is_finite()) {
            return Err(Error::invalid_config(format!("invalid wall rectangle {rect:?}")));
        }
        if rect.x < 0.0 || rect.y < 0.0 || rect.x + rect.w > self.width || rect.y + rect.h > self.height
        {
            log::warn!("wall of {material} at {rect:?} clipped to the layout extent");
        }

        let (col_0, col_1) = cell_span(rect.x, rect.w, self.grid.resolution, self.grid.n_cols);
        let (row_0, row_1) = cell_span(rect.y, rect.h, self.grid.resolution, self.grid.n_rows);
        if col_0 >= col_1 || row_0 >= row_1 {
            log::warn!("wall of {material} at {rect:?} lies outside the layout");
            return Ok(());
        }

        let depth = if rect.w <= rect.h {
            col_1 - col_0
        } else {
            row_1 - row_0
        };
        let occupant = Occupant {
            material: idx,
            thickness,
            share: 1.0 / depth as f64,
        };
        for row in row_0..row_1 {
            for col in col_0..col_1 {
                self.cells[row * self.grid.n_cols + col].push(occupant);
            }
        }
        Ok(())
    }

    /// Add `thickness` meters of `material` to a single cell.
    pub fn add_occupant(
        &mut self,
        col: usize,
        row: usize,
        material: &str,
        thickness: f64,
    ) -> Result<()> {
        let idx = self.catalog.index_of(material)?;
        if col >= self.grid.n_cols || row >= self.grid.n_rows {
            return Err(Error::invalid_config(format!(
                "cell ({col}, {row}) outside the {} x {} grid",
                self.grid.n_cols, self.grid.n_rows
            )));
        }
        if !(thickness > 0.0 && thickness.is_finite()) {
            return Err(Error::invalid_config(format!(
                "cell thickness must be positive, but is {thickness}"
            )));
        }
        self.cells[row * self.grid.n_cols + col].push(Occupant {
            material: idx,
            thickness,
            share: 1.0,
        });
        Ok(())
    }

    pub fn add_access_point(&mut self, ap: AccessPoint) -> Result<()> {
        if self.access_points.len() >= MAX_ACCESS_POINTS {
            return Err(Error::invalid_config(format!(
                "at most {MAX_ACCESS_POINTS} access points are supported"
            )));
        }
        if self.access_points.iter().any(|other| other.id == ap.id) {
            return Err(Error::invalid_config(format!(
                "duplicate access point id {:?}",
                ap.id
            )));
        }
        if !ap.position.is_finite() {
            return Err(Error::InvalidGeometry {
                reason: format!("access point {:?} has a non-finite position", ap.id),
            });
        }
        check_bounds(self.width, self.height, ap.position, "access point")?;
        if !ap.tx_power_dbm.is_finite() {
            return Err(Error::invalid_config(format!(
                "access point {:?} has invalid transmit power {}",
                ap.id, ap.tx_power_dbm
            )));
        }
        if !(ap.frequency_ghz > 0.0 && ap.frequency_ghz.is_finite()) {
            return Err(Error::invalid_config(format!(
                "access point {:?} has invalid frequency {}",
                ap.id, ap.frequency_ghz
            )));
        }
        self.access_points.push(ap);
        Ok(())
    }

    pub fn build(self) -> BuildingLayout {
        let n_occupied = self.cells.iter().filter(|cell| !cell.is_empty()).count();
        log::debug!(
            "built {} x {} layout with {n_occupied} occupied cells and {} access points",
            self.grid.n_cols,
            self.grid.n_rows,
            self.access_points.len()
        );
        BuildingLayout {
            width: self.width,
            height: self.height,
            grid: self.grid,
            catalog: self.catalog,
            cells: self.cells,
            access_points: self.access_points,
        }
    }
}

/// Cell range covered by the interval [`start`, `start + len`), clipped to the grid.
fn cell_span(start: f64, len: f64, res: f64, n: usize) -> (usize, usize) {
    let to_idx = |coord: f64| (coord / res).round().clamp(0.0, n as f64) as usize;
    let lo = to_idx(start);
    let mut hi = to_idx(start + len);
    // Walls thinner than a cell still occupy one.
    if hi == lo && lo < n && start + len > 0.0 {
        hi = lo + 1;
    }
    (lo, hi)
}

fn check_bounds(width: f64, height: f64, pos: Point, what: &'static str) -> Result<()> {
    if !(0.0..=width).contains(&pos.x) || !(0.0..=height).contains(&pos.y) {
        return Err(Error::OutOfBounds {
            what,
            x: pos.x,
            y: pos.y,
            width,
            height,
        });
    }
    Ok(())
}

/// Frozen material grid and access points of a floor.
#[derive(Debug, Clone)]
pub struct BuildingLayout {
    width: f64,
    height: f64,
    grid: CellGrid,
    catalog: Arc<MaterialCatalog>,
    cells: Vec<Vec<Occupant>>,
    access_points: Vec<AccessPoint>,
}

impl BuildingLayout {
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        &self.catalog
    }

    pub fn access_points(&self) -> &[AccessPoint] {
        &self.access_points
    }

    pub fn occupants(&self, col: usize, row: usize) -> &[Occupant] {
        &self.cells[row * self.grid.n_cols + col]
    }

    /// Fail with [`Error::OutOfBounds`] unless `pos` lies inside the extent.
    pub fn check_bounds(&self, pos: Point, what: &'static str) -> Result<()> {
        check_bounds(self.width, self.height, pos, what)
    }
}
