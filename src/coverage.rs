//! Coverage aggregation: best-server surface and coverage statistics.

use crate::engine::Dataset;
use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::propagation::{RSSI_MAX_DBM, RSSI_MIN_DBM};
use crate::stats::{Accumulator, AccumulatorReport, Histogram};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GOOD_THRESHOLD_DBM: f64 = -70.0;
pub const DEFAULT_FAIR_THRESHOLD_DBM: f64 = -80.0;
pub const DEFAULT_HIST_BINS: usize = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageOptions {
    pub good_threshold_dbm: f64,
    pub fair_threshold_dbm: f64,
    pub hist_bins: usize,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            good_threshold_dbm: DEFAULT_GOOD_THRESHOLD_DBM,
            fair_threshold_dbm: DEFAULT_FAIR_THRESHOLD_DBM,
            hist_bins: DEFAULT_HIST_BINS,
        }
    }
}

/// Summary of one RSSI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub rssi: AccumulatorReport,
    /// Fraction of points at or above the good threshold.
    pub good_fraction: f64,
    /// Fraction of points at or above the fair threshold.
    pub fair_fraction: f64,
    pub histogram: Histogram,
}

struct CoverageTally {
    acc: Accumulator,
    n_good: usize,
    n_fair: usize,
    histogram: Histogram,
}

impl CoverageTally {
    fn new(opts: &CoverageOptions) -> Self {
        Self {
            acc: Accumulator::new(),
            n_good: 0,
            n_fair: 0,
            histogram: Histogram::new(RSSI_MIN_DBM, RSSI_MAX_DBM, opts.hist_bins),
        }
    }

    fn add(&mut self, rssi_dbm: f64, opts: &CoverageOptions) {
        self.acc.add(rssi_dbm);
        if rssi_dbm >= opts.good_threshold_dbm {
            self.n_good += 1;
        }
        if rssi_dbm >= opts.fair_threshold_dbm {
            self.n_fair += 1;
        }
        self.histogram.add(rssi_dbm);
    }

    fn report(self) -> CoverageStats {
        let rssi = self.acc.report();
        let n_vals = rssi.n_vals.max(1) as f64;
        CoverageStats {
            good_fraction: self.n_good as f64 / n_vals,
            fair_fraction: self.n_fair as f64 / n_vals,
            rssi,
            histogram: self.histogram,
        }
    }
}

/// RSSI surface of a single access point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApSurface {
    pub ap_id: String,
    pub rssi_dbm: Vec<f64>,
    pub stats: CoverageStats,
}

/// Best-server surface over all access points, plus the per-AP surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSurface {
    pub points: Vec<Point>,
    /// Maximum RSSI over access points at each point.
    pub best_dbm: Vec<f64>,
    /// Index of the access point providing `best_dbm`; the lowest index on ties.
    pub best_ap: Vec<usize>,
    pub per_ap: Vec<ApSurface>,
    pub combined: CoverageStats,
}

/// Reduce the per-AP grids of `dataset` into a [`CoverageSurface`].
pub fn combine(dataset: &Dataset, opts: &CoverageOptions) -> Result<CoverageSurface> {
    if opts.good_threshold_dbm < opts.fair_threshold_dbm {
        return Err(Error::invalid_config(format!(
            "good threshold {} must not be below fair threshold {}",
            opts.good_threshold_dbm, opts.fair_threshold_dbm
        )));
    }
    let Some(first) = dataset.per_ap.first() else {
        return Err(Error::invalid_config("dataset has no access point grids"));
    };

    let points: Vec<Point> = first.samples.iter().map(|sample| sample.point).collect();
    for ap_grid in &dataset.per_ap {
        let aligned = ap_grid.samples.len() == points.len()
            && ap_grid
                .samples
                .iter()
                .zip(&points)
                .all(|(sample, point)| sample.point == *point);
        if !aligned {
            return Err(Error::invalid_config(format!(
                "grid of {:?} is not aligned with the other access points",
                ap_grid.ap.id
            )));
        }
    }

    let mut best_dbm = vec![f64::NEG_INFINITY; points.len()];
    let mut best_ap = vec![0; points.len()];
    let mut per_ap = Vec::with_capacity(dataset.per_ap.len());
    for (ap_idx, ap_grid) in dataset.per_ap.iter().enumerate() {
        let mut tally = CoverageTally::new(opts);
        let rssi_dbm: Vec<f64> = ap_grid.rssi().collect();
        for (i_pnt, &rssi) in rssi_dbm.iter().enumerate() {
            tally.add(rssi, opts);
            if rssi > best_dbm[i_pnt] {
                best_dbm[i_pnt] = rssi;
                best_ap[i_pnt] = ap_idx;
            }
        }
        per_ap.push(ApSurface {
            ap_id: ap_grid.ap.id.clone(),
            rssi_dbm,
            stats: tally.report(),
        });
    }

    let mut tally = CoverageTally::new(opts);
    best_dbm.iter().for_each(|&rssi| tally.add(rssi, opts));
    let combined = tally.report();

    log::info!(
        "combined coverage: mean {:.2} dBm, good {:.1}%, fair {:.1}%",
        combined.rssi.mean,
        100.0 * combined.good_fraction,
        100.0 * combined.fair_fraction
    );

    Ok(CoverageSurface {
        points,
        best_dbm,
        best_ap,
        per_ap,
        combined,
    })
}
