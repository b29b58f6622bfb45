//! Sampling grid engine: evaluates every (access point, sample point) pair.

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::layout::{AccessPoint, BuildingLayout};
use crate::propagation::{DEFAULT_NOISE_STD_DEV_DB, Propagator, SignalSample};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of sample points along each axis of the floor.
///
/// Points span the full extent with both edges included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub n_x: usize,
    pub n_y: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self { n_x: 200, n_y: 120 }
    }
}

impl GridSpec {
    pub fn n_points(&self) -> usize {
        self.n_x * self.n_y
    }

    /// Sample points in row-major order (x varies fastest).
    pub fn points(&self, width: f64, height: f64) -> Vec<Point> {
        let xs = linspace(width, self.n_x);
        let ys = linspace(height, self.n_y);
        ys.iter()
            .flat_map(|&y| xs.iter().map(move |&x| Point::new(x, y)))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.n_x < 2 || self.n_y < 2 {
            return Err(Error::invalid_config(format!(
                "sampling grid must be at least 2 x 2, but is {} x {}",
                self.n_x, self.n_y
            )));
        }
        Ok(())
    }
}

fn linspace(extent: f64, n: usize) -> Vec<f64> {
    let last = n.saturating_sub(1).max(1) as f64;
    (0..n)
        .map(|i| if i + 1 == n { extent } else { extent * i as f64 / last })
        .collect()
}

/// Options of a dataset generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    pub noise_std_dev_db: f64,
    /// Reflected paths added to every prediction.
    pub multipath_paths: usize,
    /// Base seed of the noise streams; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Worker threads; the rayon default when absent.
    pub threads: Option<usize>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            noise_std_dev_db: DEFAULT_NOISE_STD_DEV_DB,
            multipath_paths: 0,
            seed: None,
            threads: None,
        }
    }
}

/// Signal samples of one access point over the whole sampling grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApGrid {
    pub ap: AccessPoint,
    pub samples: Vec<SignalSample>,
}

impl ApGrid {
    pub fn rssi(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|sample| sample.rssi_dbm)
    }
}

/// Per-access-point signal grids of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub width: f64,
    pub height: f64,
    pub grid: GridSpec,
    pub seed: u64,
    pub per_ap: Vec<ApGrid>,
}

impl Dataset {
    pub fn n_rows(&self) -> usize {
        self.per_ap.iter().map(|ap_grid| ap_grid.samples.len()).sum()
    }
}

/// Simulate every access point of `layout` at every point of `grid`.
pub fn generate_dataset(
    layout: &BuildingLayout,
    grid: GridSpec,
    opts: &SamplingOptions,
) -> Result<Dataset> {
    generate_dataset_with_cancel(layout, grid, opts, &AtomicBool::new(false))
}

/// Like [`generate_dataset`], stopping with [`Error::Cancelled`] once `cancel`
/// is set. Work items already running finish; no new ones start.
pub fn generate_dataset_with_cancel(
    layout: &BuildingLayout,
    grid: GridSpec,
    opts: &SamplingOptions,
    cancel: &AtomicBool,
) -> Result<Dataset> {
    grid.validate()?;
    if layout.access_points().is_empty() {
        return Err(Error::invalid_config("layout has no access points"));
    }
    let propagator =
        Propagator::new(layout, opts.noise_std_dev_db)?.with_multipath(opts.multipath_paths)?;

    let seed = match opts.seed {
        Some(seed) => seed,
        None => {
            let seed: u64 = rand::random();
            log::info!("drew noise seed {seed}");
            seed
        }
    };

    let points = grid.points(layout.width(), layout.height());

    let mut pool_builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = opts.threads {
        pool_builder = pool_builder.num_threads(threads);
    }
    let pool = pool_builder
        .build()
        .map_err(|err| Error::invalid_config(format!("failed to build thread pool: {err}")))?;
    log::debug!("using {} thread(s)", pool.current_num_threads());

    let n_aps = layout.access_points().len();
    let mut per_ap = Vec::with_capacity(n_aps);
    for (ap_idx, ap) in layout.access_points().iter().enumerate() {
        let samples = pool.install(|| {
            sample_access_point(&propagator, ap_idx, ap, &points, seed, cancel)
        })?;

        let progress = 100.0 * (ap_idx + 1) as f64 / n_aps as f64;
        log::info!("simulated {:?}, completed {progress:06.2}%", ap.id);

        per_ap.push(ApGrid {
            ap: ap.clone(),
            samples,
        });
    }

    Ok(Dataset {
        width: layout.width(),
        height: layout.height(),
        grid,
        seed,
        per_ap,
    })
}

fn sample_access_point(
    propagator: &Propagator,
    ap_idx: usize,
    ap: &AccessPoint,
    points: &[Point],
    seed: u64,
    cancel: &AtomicBool,
) -> Result<Vec<SignalSample>> {
    let n_points = points.len();
    points
        .par_iter()
        .enumerate()
        .map(|(point_idx, &point)| {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            let mut rng = pair_rng(seed, ap_idx * n_points + point_idx);
            propagator.predict_sample(ap_idx, ap, point, &mut rng)
        })
        .collect()
}

/// Noise stream owned by a single (access point, point) pair.
///
/// Every pair reads its own ChaCha stream, so results do not depend on how
/// the work is scheduled.
pub fn pair_rng(seed: u64, pair_idx: usize) -> ChaCha12Rng {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    rng.set_stream(pair_idx as u64);
    rng
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutBuilder, Rect};
    use crate::material::MaterialCatalog;
    use crate::propagation::{RSSI_MAX_DBM, RSSI_MIN_DBM};
    use std::sync::Arc;

    fn office() -> BuildingLayout {
        let catalog = Arc::new(MaterialCatalog::standard());
        let mut builder = LayoutBuilder::new(20.0, 12.0, 0.1, catalog).unwrap();
        builder
            .add_wall("concrete", Rect::new(10.0, 0.0, 0.2, 12.0), None)
            .unwrap();
        builder
            .add_wall("glass", Rect::new(0.0, 6.0, 20.0, 0.1), None)
            .unwrap();
        builder
            .add_access_point(AccessPoint::new("AP1", Point::new(4.0, 3.0)).with_channel(1))
            .unwrap();
        builder
            .add_access_point(AccessPoint::new("AP2", Point::new(16.0, 9.0)).with_channel(6))
            .unwrap();
        builder.build()
    }

    fn opts(seed: u64, threads: usize) -> SamplingOptions {
        SamplingOptions {
            noise_std_dev_db: 2.0,
            multipath_paths: 0,
            seed: Some(seed),
            threads: Some(threads),
        }
    }

    #[test]
    fn grid_points_cover_extent() {
        let points = GridSpec { n_x: 5, n_y: 3 }.points(50.0, 30.0);
        assert_eq!(points.len(), 15);
        assert_eq!(points[0], Point::new(0.0, 0.0));
        assert_eq!(points[1], Point::new(12.5, 0.0));
        assert_eq!(points[4], Point::new(50.0, 0.0));
        assert_eq!(points[14], Point::new(50.0, 30.0));
    }

    #[test]
    fn default_grid() {
        let grid = GridSpec::default();
        assert_eq!(grid.n_points(), 24_000);
        let points = grid.points(50.0, 30.0);
        assert!((points[1].x - points[0].x - 50.0 / 199.0).abs() < 1e-12);
    }

    #[test]
    fn dataset_shape() {
        let layout = office();
        let grid = GridSpec { n_x: 21, n_y: 13 };
        let dataset = generate_dataset(&layout, grid, &opts(1, 2)).unwrap();

        assert_eq!(dataset.seed, 1);
        assert_eq!(dataset.per_ap.len(), 2);
        assert_eq!(dataset.n_rows(), 2 * 21 * 13);
        for (ap_idx, ap_grid) in dataset.per_ap.iter().enumerate() {
            assert!(ap_grid.samples.iter().all(|s| s.ap == ap_idx));
            assert!(ap_grid.rssi().all(|rssi| (RSSI_MIN_DBM..=RSSI_MAX_DBM).contains(&rssi)));
        }
    }

    #[test]
    fn reproducible_across_thread_counts() {
        let layout = office();
        let grid = GridSpec { n_x: 17, n_y: 9 };
        let serial = generate_dataset(&layout, grid, &opts(99, 1)).unwrap();
        let parallel = generate_dataset(&layout, grid, &opts(99, 4)).unwrap();
        assert_eq!(serial, parallel);

        let other = generate_dataset(&layout, grid, &opts(100, 4)).unwrap();
        assert_ne!(serial, other);
    }

    #[test]
    fn multipath_reproducible_across_thread_counts() {
        let layout = office();
        let grid = GridSpec { n_x: 9, n_y: 5 };
        let with_paths = |threads| SamplingOptions {
            multipath_paths: 3,
            ..opts(7, threads)
        };
        let serial = generate_dataset(&layout, grid, &with_paths(1)).unwrap();
        let parallel = generate_dataset(&layout, grid, &with_paths(3)).unwrap();
        assert_eq!(serial, parallel);

        let direct = generate_dataset(&layout, grid, &opts(7, 3)).unwrap();
        assert_ne!(serial, direct);
    }

    #[test]
    fn noise_is_independent_per_pair() {
        let layout = office();
        let grid = GridSpec { n_x: 5, n_y: 5 };
        let noisy = generate_dataset(&layout, grid, &opts(3, 2)).unwrap();
        let exact = generate_dataset(
            &layout,
            grid,
            &SamplingOptions {
                noise_std_dev_db: 0.0,
                ..opts(3, 2)
            },
        )
        .unwrap();

        let residuals: Vec<f64> = noisy.per_ap[0]
            .samples
            .iter()
            .zip(&exact.per_ap[0].samples)
            .filter(|(_, e)| e.rssi_dbm > RSSI_MIN_DBM && e.rssi_dbm < RSSI_MAX_DBM)
            .map(|(n, e)| n.rssi_dbm - e.rssi_dbm)
            .collect();
        assert!(residuals.len() > 2);
        assert!(residuals.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn cancelled_run() {
        let layout = office();
        let cancel = AtomicBool::new(true);
        let result =
            generate_dataset_with_cancel(&layout, GridSpec::default(), &opts(0, 2), &cancel);
        assert_eq!(result.unwrap_err(), Error::Cancelled);
    }

    #[test]
    fn rejects_bad_input() {
        let layout = office();
        let tiny = GridSpec { n_x: 1, n_y: 10 };
        assert!(generate_dataset(&layout, tiny, &opts(0, 1)).is_err());

        let catalog = Arc::new(MaterialCatalog::standard());
        let empty = LayoutBuilder::new(10.0, 10.0, 0.1, catalog).unwrap().build();
        assert!(matches!(
            generate_dataset(&empty, GridSpec::default(), &opts(0, 1)),
            Err(Error::InvalidConfiguration { .. })
        ));
    }
}
