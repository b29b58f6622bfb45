use anyhow::{Context, Result};
use glob::glob;
use rssimap::config::Config;
use rssimap::coverage::combine;
use rssimap::engine::generate_dataset;
use rssimap::export::{
    load_dataset, save_dataset, write_coverage_csv, write_coverage_report, write_dataset_csv,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Self {
        Self {
            sim_dir: sim_dir.as_ref().to_path_buf(),
        }
    }

    pub fn init_config(&self) -> Result<()> {
        fs::create_dir_all(&self.sim_dir)
            .with_context(|| format!("failed to create {:?}", self.sim_dir))?;
        let config_file = self.config_file();
        Config::template()
            .to_file(&config_file)
            .context("failed to write config")?;
        log::info!("wrote {config_file:?}");
        Ok(())
    }

    pub fn simulate(&self, seed: Option<u64>) -> Result<()> {
        let mut cfg = self.load_config()?;
        if seed.is_some() {
            cfg.run.seed = seed;
        }

        let layout = cfg.build_layout().context("failed to build layout")?;
        let dataset = generate_dataset(&layout, cfg.grid(), &cfg.sampling_options())
            .context("failed to generate dataset")?;

        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        save_dataset(&dataset, run_dir.join("dataset.msgpack"))
            .context("failed to save dataset")?;
        write_dataset_csv(&dataset, run_dir.join("dataset.csv"))
            .context("failed to export dataset")?;
        let seed_file = run_dir.join("seed.txt");
        fs::write(&seed_file, format!("{}\n", dataset.seed))
            .with_context(|| format!("failed to write {seed_file:?}"))?;

        log::info!("wrote {} samples to {run_dir:?}", dataset.n_rows());
        Ok(())
    }

    pub fn analyze(&self) -> Result<()> {
        let cfg = self.load_config()?;

        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            let dataset = load_dataset(run_dir.join("dataset.msgpack"))
                .with_context(|| format!("failed to load dataset of {run_dir:?}"))?;

            let surface = combine(&dataset, &cfg.coverage).context("failed to combine grids")?;

            write_coverage_csv(&surface, run_dir.join("coverage.csv"))
                .context("failed to export coverage")?;
            write_coverage_report(&surface, dataset.seed, run_dir.join("coverage.json"))
                .context("failed to save coverage report")?;
            log::info!("analyzed {run_dir:?}");
        }

        Ok(())
    }

    pub fn clean(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn load_config(&self) -> Result<Config> {
        let cfg = Config::from_file(self.config_file()).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");
        Ok(cfg)
    }

    fn config_file(&self) -> PathBuf {
        self.sim_dir.join("config.toml")
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }
}
