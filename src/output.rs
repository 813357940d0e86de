//! This module is in charge of persisting the histograms and reporting on the
//! outcome of a run

use crate::{
    analysis::CutFlow,
    config::Channel,
    histogram::{Hist1D, Hist2D, Histogram, HistogramSet},
    reader::ReadStats,
    Result,
};
use eyre::{bail, eyre, WrapErr};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    time::Duration,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;

/// Contents of a histogram file: every histogram of a run, under one group
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramFile {
    /// Channel which filled the histograms
    pub channel: Channel,

    /// Group name
    pub directory: String,

    /// Histograms, keyed by name
    pub histograms: HistogramSet,
}
//
impl HistogramFile {
    /// Write the histograms to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .wrap_err_with(|| format!("Failed to create histogram file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)
            .wrap_err_with(|| format!("Failed to write histograms to {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }

    /// Read histograms back from disk
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("Failed to open histogram file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("Failed to decode histogram file {}", path.display()))
    }

    /// Look up a histogram which must exist
    pub fn get(&self, name: &str) -> Result<&Histogram> {
        self.histograms
            .get(name)
            .ok_or_else(|| eyre!("Histogram {}/{name} not found", self.directory))
    }

    /// Look up a 1-D histogram which must exist
    pub fn get_1d(&self, name: &str) -> Result<&Hist1D> {
        match self.get(name)? {
            Histogram::OneD(hist) => Ok(hist),
            Histogram::TwoD(_) => bail!("Histogram {}/{name} is not one-dimensional", self.directory),
        }
    }

    /// Look up a 2-D histogram which must exist
    pub fn get_2d(&self, name: &str) -> Result<&Hist2D> {
        match self.get(name)? {
            Histogram::TwoD(hist) => Ok(hist),
            Histogram::OneD(_) => bail!("Histogram {}/{name} is not two-dimensional", self.directory),
        }
    }
}

/// Report on the outcome of a run
pub fn log_summary(read_stats: &ReadStats, cut_flow: &CutFlow, elapsed_time: Duration) {
    // Compute a timestamp of when the run ended
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "(unknown time)".to_owned());

    info!("---------------------------------------------");
    info!("Run finished           : {timestamp}");
    info!("Records read           : {}", read_stats.records);
    info!("... malformed          : {}", read_stats.malformed);
    info!("... after preselection : {}", read_stats.examined());
    info!("... passing reference  : {}", cut_flow.passed_reference);
    info!("... selected           : {}", cut_flow.selected);
    let elapsed_secs = elapsed_time.as_secs_f64();
    info!("Elapsed time (s)       : {elapsed_secs:.3}");
    if read_stats.records > 0 {
        info!(
            "Time per record (s)    : {:.3e}",
            elapsed_secs / read_stats.records as f64
        );
    }
}
