use crate::coverage::CoverageOptions;
use crate::engine::{GridSpec, SamplingOptions};
use crate::floor_plan::{Preset, WallSpec, default_access_points, preset_walls};
use crate::geometry::Point;
use crate::layout::{
    AccessPoint, BuildingLayout, DEFAULT_FREQUENCY_GHZ, DEFAULT_TX_POWER_DBM, LayoutBuilder,
    MAX_ACCESS_POINTS, MAX_CELLS,
};
use crate::material::{Material, MaterialCatalog};
use crate::propagation::{DEFAULT_NOISE_STD_DEV_DB, RSSI_MAX_DBM, RSSI_MIN_DBM};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path, sync::Arc};

/// Simulation configuration.
///
/// Loaded from a TOML file and validated before use. Every section and key
/// is optional and falls back to its default.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub layout: LayoutConfig,
    pub sampling: SamplingConfig,
    pub radio: RadioConfig,
    pub coverage: CoverageOptions,
    pub run: RunConfig,

    /// Custom materials registered next to the standard ones.
    pub materials: Vec<Material>,
    /// Walls added on top of the preset.
    pub walls: Vec<WallSpec>,
    /// Access points; the preset's default placement when empty.
    pub access_points: Vec<ApConfig>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Floor width in meters.
    pub width: f64,
    /// Floor height in meters.
    pub height: f64,
    /// Side of a material grid cell in meters.
    pub resolution: f64,
    pub preset: Preset,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 50.0,
            height: 30.0,
            resolution: 0.1,
            preset: Preset::Office,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    pub n_x: usize,
    pub n_y: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let grid = GridSpec::default();
        Self {
            n_x: grid.n_x,
            n_y: grid.n_y,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RadioConfig {
    pub tx_power_dbm: f64,
    pub frequency_ghz: f64,
    /// Standard deviation of the Gaussian measurement noise.
    pub noise_std_dev_db: f64,
    /// Number of reflected paths summed with the direct one; zero disables them.
    pub multipath_paths: usize,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
            frequency_ghz: DEFAULT_FREQUENCY_GHZ,
            noise_std_dev_db: DEFAULT_NOISE_STD_DEV_DB,
            multipath_paths: 0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Noise seed; runs without one are not reproducible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

/// Access point entry; unset radio values come from `[radio]`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApConfig {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power_dbm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_ghz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
}

impl ApConfig {
    fn to_access_point(&self, radio: &RadioConfig) -> AccessPoint {
        AccessPoint {
            id: self.id.clone(),
            position: Point::new(self.x, self.y),
            tx_power_dbm: self.tx_power_dbm.unwrap_or(radio.tx_power_dbm),
            frequency_ghz: self.frequency_ghz.unwrap_or(radio.frequency_ghz),
            channel: self.channel,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;
        config.validate().context("failed to validate config")?;
        Ok(config)
    }

    /// Default configuration with the preset's access points written out.
    pub fn template() -> Self {
        let mut config = Self::default();
        config.access_points = default_access_points(config.layout.width, config.layout.height)
            .into_iter()
            .map(|ap| ApConfig {
                id: ap.id,
                x: ap.position.x,
                y: ap.position.y,
                tx_power_dbm: None,
                frequency_ghz: None,
                channel: ap.channel,
            })
            .collect();
        config
    }

    pub fn to_file<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let layout = &self.layout;
        check_num(layout.width, 1.0..=1_000.0).context("invalid layout width")?;
        check_num(layout.height, 1.0..=1_000.0).context("invalid layout height")?;
        check_num(layout.resolution, 0.01..=1.0).context("invalid layout resolution")?;
        let n_cells = (layout.width / layout.resolution).round()
            * (layout.height / layout.resolution).round();
        if n_cells > MAX_CELLS as f64 {
            bail!(
                "layout {} x {} at resolution {} needs more than {MAX_CELLS} cells",
                layout.width,
                layout.height,
                layout.resolution
            );
        }

        check_num(self.sampling.n_x, 2..=10_000).context("invalid number of points along x")?;
        check_num(self.sampling.n_y, 2..=10_000).context("invalid number of points along y")?;

        let radio = &self.radio;
        check_num(radio.tx_power_dbm, -50.0..=50.0).context("invalid transmit power")?;
        check_num(radio.frequency_ghz, 0.1..=100.0).context("invalid frequency")?;
        check_num(radio.noise_std_dev_db, 0.0..=20.0).context("invalid noise standard deviation")?;
        check_num(radio.multipath_paths, 0..=16).context("invalid number of multipath paths")?;

        let coverage = &self.coverage;
        check_num(coverage.good_threshold_dbm, RSSI_MIN_DBM..=RSSI_MAX_DBM)
            .context("invalid good coverage threshold")?;
        check_num(coverage.fair_threshold_dbm, RSSI_MIN_DBM..=RSSI_MAX_DBM)
            .context("invalid fair coverage threshold")?;
        if coverage.good_threshold_dbm < coverage.fair_threshold_dbm {
            bail!("good coverage threshold must not be below the fair threshold");
        }
        check_num(coverage.hist_bins, 1..=1_000).context("invalid number of histogram bins")?;

        if let Some(threads) = self.run.threads {
            check_num(threads, 1..=1_024).context("invalid number of threads")?;
        }

        if self.access_points.len() > MAX_ACCESS_POINTS {
            bail!(
                "at most {MAX_ACCESS_POINTS} access points are supported, but {} are configured",
                self.access_points.len()
            );
        }
        for ap in &self.access_points {
            if let Some(tx_power_dbm) = ap.tx_power_dbm {
                check_num(tx_power_dbm, -50.0..=50.0)
                    .with_context(|| format!("invalid transmit power of {:?}", ap.id))?;
            }
            if let Some(frequency_ghz) = ap.frequency_ghz {
                check_num(frequency_ghz, 0.1..=100.0)
                    .with_context(|| format!("invalid frequency of {:?}", ap.id))?;
            }
        }

        Ok(())
    }

    pub fn grid(&self) -> GridSpec {
        GridSpec {
            n_x: self.sampling.n_x,
            n_y: self.sampling.n_y,
        }
    }

    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            noise_std_dev_db: self.radio.noise_std_dev_db,
            multipath_paths: self.radio.multipath_paths,
            seed: self.run.seed,
            threads: self.run.threads,
        }
    }

    /// Construct the material catalog, rasterise the walls and place the
    /// access points.
    pub fn build_layout(&self) -> Result<BuildingLayout> {
        let catalog = MaterialCatalog::with_custom(self.materials.iter().cloned())
            .context("failed to construct material catalog")?;

        let layout = &self.layout;
        let mut builder =
            LayoutBuilder::new(layout.width, layout.height, layout.resolution, Arc::new(catalog))
                .context("failed to construct layout")?;

        let walls = preset_walls(layout.preset, layout.width, layout.height);
        for (i_wall, wall) in walls.iter().chain(&self.walls).enumerate() {
            wall.apply(&mut builder)
                .with_context(|| format!("failed to add wall {i_wall} ({wall:?})"))?;
        }

        let aps: Vec<AccessPoint> = if self.access_points.is_empty() {
            default_access_points(layout.width, layout.height)
                .into_iter()
                .map(|ap| {
                    ap.with_tx_power(self.radio.tx_power_dbm)
                        .with_frequency(self.radio.frequency_ghz)
                })
                .collect()
        } else {
            self.access_points
                .iter()
                .map(|ap| ap.to_access_point(&self.radio))
                .collect()
        };
        for ap in aps {
            let id = ap.id.clone();
            builder
                .add_access_point(ap)
                .with_context(|| format!("failed to add access point {id:?}"))?;
        }

        Ok(builder.build())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.grid(), GridSpec { n_x: 200, n_y: 120 });
        assert_eq!(config.sampling_options().noise_std_dev_db, 2.0);

        let layout = config.build_layout().unwrap();
        assert_eq!(layout.access_points().len(), 4);
        assert_eq!(layout.grid().n_cols, 500);
    }

    #[test]
    fn full_file() {
        let contents = r#"
[layout]
width = 20.0
height = 10.0
resolution = 0.05
preset = "empty"

[sampling]
n_x = 41
n_y = 21

[radio]
tx_power_dbm = 17.0
noise_std_dev_db = 0.0

[coverage]
good_threshold_dbm = -65.0
fair_threshold_dbm = -75.0
hist_bins = 7

[run]
seed = 12
threads = 2

[[materials]]
id = "brick"
permittivity = 4.0
conductivity = 0.02
thickness = 0.1

[[walls]]
material = "brick"
x = 10.0
y = 0.0
w = 0.2
h = 10.0

[[access_points]]
id = "north"
x = 5.0
y = 5.0
channel = 1

[[access_points]]
id = "south"
x = 15.0
y = 5.0
frequency_ghz = 5.0
"#;
        let config = Config::from_toml(contents).unwrap();
        assert_eq!(config.run.seed, Some(12));
        assert_eq!(config.sampling_options().threads, Some(2));

        let layout = config.build_layout().unwrap();
        let aps = layout.access_points();
        assert_eq!(aps.len(), 2);
        assert_eq!(aps[0].tx_power_dbm, 17.0);
        assert_eq!(aps[0].frequency_ghz, 2.4);
        assert_eq!(aps[1].frequency_ghz, 5.0);
        assert_eq!(aps[0].channel, Some(1));
        assert_eq!(layout.grid().n_cols, 400);
        assert!(!layout.occupants(201, 100).is_empty());
    }

    #[test]
    fn invalid_values() {
        assert!(Config::from_toml("[layout]\nresolution = 0.0\n").is_err());
        assert!(Config::from_toml("[sampling]\nn_x = 1\n").is_err());
        assert!(Config::from_toml("[radio]\nnoise_std_dev_db = -1.0\n").is_err());
        assert!(Config::from_toml("[coverage]\ngood_threshold_dbm = -90.0\n").is_err());
        assert!(Config::from_toml("[layout]\ncolour = \"red\"\n").is_err());
        assert!(Config::from_toml("[radio]\nmultipath_paths = 100\n").is_err());

        let five_aps: String = (0..5)
            .map(|i| format!("[[access_points]]\nid = \"AP{i}\"\nx = 1.0\ny = 1.0\n"))
            .collect();
        assert!(Config::from_toml(&five_aps).is_err());
    }

    #[test]
    fn oversized_layout_is_rejected() {
        let huge = "[layout]\nwidth = 1000.0\nheight = 1000.0\nresolution = 0.1\n";
        let err = Config::from_toml(huge).unwrap_err();
        assert!(format!("{err:#}").contains("cells"), "{err:#}");
        assert!(Config::from_toml("[layout]\nwidth = 10000.0\n").is_err());
        assert!(Config::from_toml("[layout]\nresolution = 0.001\n").is_err());
    }

    #[test]
    fn wall_typos_are_rejected() {
        let wall = "[[walls]]\nmaterial = \"wood\"\nx = 1.0\ny = 1.0\nw = 1.0\nh = 1.0\n";
        assert!(Config::from_toml(wall).is_ok());
        let typo = format!("{wall}thicknes = 0.3\n");
        assert!(Config::from_toml(&typo).is_err());
    }

    #[test]
    fn multipath_reaches_sampling_options() {
        let config = Config::from_toml("[radio]\nmultipath_paths = 3\n").unwrap();
        assert_eq!(config.sampling_options().multipath_paths, 3);
        assert_eq!(Config::default().sampling_options().multipath_paths, 0);
    }

    #[test]
    fn layout_errors_keep_their_kind() {
        let wall = "[[walls]]\nmaterial = \"granite\"\nx = 1.0\ny = 1.0\nw = 1.0\nh = 1.0\n";
        let err = Config::from_toml(wall).unwrap().build_layout().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownMaterial { id }) if id == "granite"
        ));

        let ap = "[[access_points]]\nid = \"AP1\"\nx = 80.0\ny = 1.0\n";
        let err = Config::from_toml(ap).unwrap().build_layout().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::OutOfBounds { x, .. }) if *x == 80.0
        ));
    }

    #[test]
    fn template_round_trips() {
        let template = Config::template();
        let contents = toml::to_string_pretty(&template).unwrap();
        assert_eq!(Config::from_toml(&contents).unwrap(), template);
    }
}
