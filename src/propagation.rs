//! Received signal strength of one access point at one point of the floor.

use crate::attenuation::SPEED_OF_LIGHT;
use crate::error::{Error, Result};
use crate::geometry::{Point, Segment};
use crate::layout::{AccessPoint, BuildingLayout};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Distance substituted when a point coincides with the access point.
pub const MIN_DISTANCE_M: f64 = 0.01;

pub const RSSI_MIN_DBM: f64 = -100.0;
pub const RSSI_MAX_DBM: f64 = -30.0;

pub const DEFAULT_NOISE_STD_DEV_DB: f64 = 2.0;

/// Range of the extra loss of a reflected path, in dB.
pub const MULTIPATH_LOSS_DB: (f64, f64) = (3.0, 20.0);
/// Received power floor of the multipath sum, in mW.
const MIN_POWER_MW: f64 = 1e-10;

/// Free-space path loss in dB for a distance in meters and a frequency in GHz.
///
/// FSPL = 20 log10(d) + 20 log10(f) + 20 log10(4π·10⁹ / c).
pub fn free_space_path_loss_db(distance_m: f64, frequency_ghz: f64) -> f64 {
    let offset = 20.0 * (4.0 * PI * 1e9 / SPEED_OF_LIGHT).log10();
    20.0 * distance_m.log10() + 20.0 * frequency_ghz.log10() + offset
}

pub fn clamp_rssi(rssi_dbm: f64) -> f64 {
    rssi_dbm.clamp(RSSI_MIN_DBM, RSSI_MAX_DBM)
}

/// Noise-free breakdown of the losses along one line of sight.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrace {
    pub distance_m: f64,
    pub fspl_db: f64,
    pub material_loss_db: f64,
    /// Loss per catalog material index; zero for materials not crossed.
    pub loss_by_material: Vec<f64>,
}

impl PathTrace {
    pub fn total_loss_db(&self) -> f64 {
        self.fspl_db + self.material_loss_db
    }
}

/// RSSI of one access point at one sample point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    /// Index of the access point in the layout.
    pub ap: usize,
    pub point: Point,
    pub rssi_dbm: f64,
    pub distance_m: f64,
    pub material_loss_db: f64,
}

/// Static reflected paths added coherently to the direct signal.
struct Multipath {
    n_paths: usize,
    loss_dist: Uniform<f64>,
    phase_dist: Uniform<f64>,
}

impl Multipath {
    fn new(n_paths: usize) -> Result<Self> {
        let (lo, hi) = MULTIPATH_LOSS_DB;
        let invalid = |err: rand::distr::uniform::Error| {
            Error::invalid_config(format!("invalid multipath distribution: {err}"))
        };
        Ok(Self {
            n_paths,
            loss_dist: Uniform::new(lo, hi).map_err(invalid)?,
            phase_dist: Uniform::new(0.0, 2.0 * PI).map_err(invalid)?,
        })
    }

    /// Sum the direct power and `n_paths` weaker copies with random phase.
    fn apply<R: Rng + ?Sized>(&self, rssi_dbm: f64, rng: &mut R) -> f64 {
        let mut power_mw = 10f64.powf(rssi_dbm / 10.0);
        for _ in 0..self.n_paths {
            let loss_db = self.loss_dist.sample(rng);
            let phase = self.phase_dist.sample(rng);
            power_mw += 10f64.powf((rssi_dbm - loss_db) / 10.0) * phase.cos();
        }
        10.0 * power_mw.max(MIN_POWER_MW).log10()
    }
}

/// Propagation model over a frozen layout.
pub struct Propagator<'a> {
    layout: &'a BuildingLayout,
    noise: Option<Normal<f64>>,
    multipath: Option<Multipath>,
}

impl<'a> Propagator<'a> {
    /// `noise_std_dev_db` of zero gives a deterministic model.
    pub fn new(layout: &'a BuildingLayout, noise_std_dev_db: f64) -> Result<Self> {
        if !(noise_std_dev_db >= 0.0 && noise_std_dev_db.is_finite()) {
            return Err(Error::invalid_config(format!(
                "noise standard deviation must be non-negative, but is {noise_std_dev_db}"
            )));
        }
        let noise = if noise_std_dev_db > 0.0 {
            let normal = Normal::new(0.0, noise_std_dev_db)
                .map_err(|err| Error::invalid_config(format!("invalid noise distribution: {err}")))?;
            Some(normal)
        } else {
            None
        };
        Ok(Self {
            layout,
            noise,
            multipath: None,
        })
    }

    /// Add `n_paths` reflected paths to every prediction; zero disables them.
    pub fn with_multipath(mut self, n_paths: usize) -> Result<Self> {
        self.multipath = match n_paths {
            0 => None,
            n_paths => Some(Multipath::new(n_paths)?),
        };
        Ok(self)
    }

    pub fn layout(&self) -> &BuildingLayout {
        self.layout
    }

    /// Predicted RSSI in dBm, clamped to [`RSSI_MIN_DBM`, `RSSI_MAX_DBM`].
    pub fn predict_rssi<R: Rng + ?Sized>(
        &self,
        ap: &AccessPoint,
        point: Point,
        rng: &mut R,
    ) -> Result<f64> {
        self.predict_sample(0, ap, point, rng)
            .map(|sample| sample.rssi_dbm)
    }

    /// Like [`Propagator::predict_rssi`], keeping the derived path features.
    pub fn predict_sample<R: Rng + ?Sized>(
        &self,
        ap_idx: usize,
        ap: &AccessPoint,
        point: Point,
        rng: &mut R,
    ) -> Result<SignalSample> {
        let (distance_m, segment) = self.line_of_sight(ap, point)?;
        let fspl_db = free_space_path_loss_db(distance_m, ap.frequency_ghz);
        let material_loss_db = self.material_loss_db(&segment, ap.frequency_ghz, None);

        let mut rssi_dbm = ap.tx_power_dbm - fspl_db - material_loss_db;
        if let Some(multipath) = &self.multipath {
            rssi_dbm = multipath.apply(rssi_dbm, rng);
        }
        if let Some(normal) = &self.noise {
            rssi_dbm += normal.sample(rng);
        }
        let rssi_dbm = clamp_rssi(rssi_dbm);

        Ok(SignalSample {
            ap: ap_idx,
            point,
            rssi_dbm,
            distance_m,
            material_loss_db,
        })
    }

    /// Noise-free loss breakdown between `ap` and `point`.
    pub fn trace(&self, ap: &AccessPoint, point: Point) -> Result<PathTrace> {
        let (distance_m, segment) = self.line_of_sight(ap, point)?;
        let mut loss_by_material = vec![0.0; self.layout.catalog().len()];
        let material_loss_db =
            self.material_loss_db(&segment, ap.frequency_ghz, Some(&mut loss_by_material));
        Ok(PathTrace {
            distance_m,
            fspl_db: free_space_path_loss_db(distance_m, ap.frequency_ghz),
            material_loss_db,
            loss_by_material,
        })
    }

    fn line_of_sight(&self, ap: &AccessPoint, point: Point) -> Result<(f64, Segment)> {
        if !point.is_finite() || !ap.position.is_finite() {
            return Err(Error::InvalidGeometry {
                reason: format!(
                    "non-finite coordinates between {:?} and ({}, {})",
                    ap.id, point.x, point.y
                ),
            });
        }
        self.layout.check_bounds(ap.position, "access point")?;
        self.layout.check_bounds(point, "sample point")?;

        let segment = Segment::new(ap.position, point);
        // Coincident points would give an infinite gain.
        let distance_m = segment.length().max(MIN_DISTANCE_M);
        Ok((distance_m, segment))
    }

    /// Sum of the losses of every wall share in every cell the segment
    /// crosses, weighted by the fraction of the cell traversed.
    fn material_loss_db(
        &self,
        segment: &Segment,
        frequency_ghz: f64,
        mut breakdown: Option<&mut Vec<f64>>,
    ) -> f64 {
        let grid = self.layout.grid();
        let catalog = self.layout.catalog();

        let mut total = 0.0;
        for crossing in segment.crossings(grid) {
            let occupants = self.layout.occupants(crossing.col, crossing.row);
            if occupants.is_empty() {
                continue;
            }
            let fraction = crossing.length / grid.resolution;
            for occupant in occupants {
                let Some(material) = catalog.get(occupant.material) else {
                    continue;
                };
                let loss = occupant.loss_db(material, frequency_ghz) * fraction;
                total += loss;
                if let Some(breakdown) = breakdown.as_deref_mut() {
                    breakdown[occupant.material] += loss;
                }
            }
        }
        total
    }
}
