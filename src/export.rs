//! Persistence of datasets and coverage results.

use crate::coverage::{CoverageStats, CoverageSurface};
use crate::engine::Dataset;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::Serialize;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Save a dataset as MessagePack so it can be analyzed later.
pub fn save_dataset<P: AsRef<Path>>(dataset: &Dataset, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, dataset).context("failed to serialize dataset")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Load a dataset saved with [`save_dataset`].
pub fn load_dataset<P: AsRef<Path>>(file: P) -> Result<Dataset> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    let dataset = decode::from_read(&mut reader).context("failed to deserialize dataset")?;
    Ok(dataset)
}

#[derive(Serialize)]
struct SampleRow<'a> {
    ap_id: &'a str,
    channel: Option<u32>,
    x: f64,
    y: f64,
    rssi_dbm: f64,
    distance_m: f64,
    material_loss_db: f64,
}

/// Write one row per (access point, sample point) for model training.
pub fn write_dataset_csv<P: AsRef<Path>>(dataset: &Dataset, file: P) -> Result<()> {
    let file = file.as_ref();
    let mut writer =
        csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
    for ap_grid in &dataset.per_ap {
        for sample in &ap_grid.samples {
            writer
                .serialize(SampleRow {
                    ap_id: &ap_grid.ap.id,
                    channel: ap_grid.ap.channel,
                    x: sample.point.x,
                    y: sample.point.y,
                    rssi_dbm: sample.rssi_dbm,
                    distance_m: sample.distance_m,
                    material_loss_db: sample.material_loss_db,
                })
                .context("failed to write sample row")?;
        }
    }
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[derive(Serialize)]
struct CoverageRow<'a> {
    x: f64,
    y: f64,
    best_rssi_dbm: f64,
    best_ap_id: &'a str,
}

/// Write the best-server surface, one row per sample point.
pub fn write_coverage_csv<P: AsRef<Path>>(surface: &CoverageSurface, file: P) -> Result<()> {
    let file = file.as_ref();
    let mut writer =
        csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
    for ((point, &best_rssi_dbm), &best_ap) in surface
        .points
        .iter()
        .zip(&surface.best_dbm)
        .zip(&surface.best_ap)
    {
        let best_ap_id = surface
            .per_ap
            .get(best_ap)
            .map_or("", |ap| ap.ap_id.as_str());
        writer
            .serialize(CoverageRow {
                x: point.x,
                y: point.y,
                best_rssi_dbm,
                best_ap_id,
            })
            .context("failed to write coverage row")?;
    }
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

#[derive(Serialize)]
struct ApReport<'a> {
    ap_id: &'a str,
    stats: &'a CoverageStats,
}

#[derive(Serialize)]
struct CoverageReport<'a> {
    seed: u64,
    per_ap: Vec<ApReport<'a>>,
    combined: &'a CoverageStats,
}

/// Write the per-AP and combined coverage statistics as JSON.
pub fn write_coverage_report<P: AsRef<Path>>(
    surface: &CoverageSurface,
    seed: u64,
    file: P,
) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let writer = BufWriter::new(file);

    let report = CoverageReport {
        seed,
        per_ap: surface
            .per_ap
            .iter()
            .map(|ap| ApReport {
                ap_id: &ap.ap_id,
                stats: &ap.stats,
            })
            .collect(),
        combined: &surface.combined,
    };
    serde_json::to_writer_pretty(writer, &report).context("failed to serialize report")?;
    Ok(())
}
