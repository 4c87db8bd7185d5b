//! Writers for measurement tables and run summaries.
//!
//! This module writes the tables of a [`MeasurementResult`]:
//! - `vac.csv` with the mean potential per nominal current
//! - `jr.csv` with the mean resistance per nominal current
//! - `overpotential.csv` with the joined rows
//! - `summary.yaml` with the fit, counts and diagnostics

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::processors::ingest::{Diagnostic, MeasurementResult};
use crate::processors::overpotential::{JoinedRecord, ResistanceRow, TafelFit, VoltageRow};

/// File name of the voltage table.
pub const VAC_FILE: &str = "vac.csv";

/// File name of the resistance table.
pub const JR_FILE: &str = "jr.csv";

/// File name of the joined overpotential table.
pub const OVERPOTENTIAL_FILE: &str = "overpotential.csv";

/// File name of the run summary.
pub const SUMMARY_FILE: &str = "summary.yaml";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// YAML serialization error.
    #[error("YAML write error for '{path}': {source}")]
    YamlError {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write a header row followed by pre-formatted data rows.
fn write_table<const N: usize>(
    path: &Path,
    header: [&str; N],
    rows: impl IntoIterator<Item = [String; N]>,
) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    csv_writer
        .write_record(header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in rows {
        csv_writer
            .write_record(&row)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the voltage table with columns `current,potential,measured_current,repeats`.
pub fn write_vac_csv(path: &Path, rows: &[VoltageRow]) -> Result<()> {
    write_table(
        path,
        ["current", "potential", "measured_current", "repeats"],
        rows.iter().map(|row| {
            [
                row.current.to_string(),
                format!("{:.9}", row.potential),
                format!("{:.9}", row.measured_current),
                row.repeats.to_string(),
            ]
        }),
    )
}

/// Write the resistance table with columns `current,resistance,repeats`.
pub fn write_jr_csv(path: &Path, rows: &[ResistanceRow]) -> Result<()> {
    write_table(
        path,
        ["current", "resistance", "repeats"],
        rows.iter().map(|row| {
            [
                row.current.to_string(),
                format!("{:.9}", row.resistance),
                row.repeats.to_string(),
            ]
        }),
    )
}

/// Write the joined table with columns
/// `current,potential,resistance,overpotential,log10_current`.
pub fn write_overpotential_csv(path: &Path, rows: &[JoinedRecord]) -> Result<()> {
    write_table(
        path,
        [
            "current",
            "potential",
            "resistance",
            "overpotential",
            "log10_current",
        ],
        rows.iter().map(|row| {
            [
                row.current.to_string(),
                format!("{:.9}", row.potential),
                format!("{:.9}", row.resistance),
                format!("{:.9}", row.overpotential),
                format!("{:.9}", row.current.log10()),
            ]
        }),
    )
}

/// Serializable overview of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementSummary<'a> {
    pub complete: bool,
    pub tafel: Option<TafelFit>,
    pub operating_points: usize,
    pub resistance_points: usize,
    pub joined_points: usize,
    pub out_of_window: usize,
    pub renamed: usize,
    pub missing: &'a [PathBuf],
    pub unrecognized: &'a [PathBuf],
    pub diagnostics: &'a [Diagnostic],
}

impl<'a> MeasurementSummary<'a> {
    pub fn from_result(result: &'a MeasurementResult) -> Self {
        Self {
            complete: result.is_complete(),
            tafel: result.tafel,
            operating_points: result.vac.len(),
            resistance_points: result.jr.len(),
            joined_points: result.joined.len(),
            out_of_window: result.out_of_window,
            renamed: result.renamed.len(),
            missing: &result.missing,
            unrecognized: &result.unrecognized,
            diagnostics: &result.diagnostics,
        }
    }
}

/// Write the run summary as YAML.
pub fn write_summary_yaml(path: &Path, result: &MeasurementResult) -> Result<()> {
    ensure_parent_dirs(path)?;

    let content = serde_yaml::to_string(&MeasurementSummary::from_result(result)).map_err(|e| {
        WriteError::YamlError {
            path: path.display().to_string(),
            source: e,
        }
    })?;

    fs::write(path, content).map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// Write every table and the summary into `output_dir`.
///
/// Returns the paths written, in a fixed order.
pub fn write_measurement(output_dir: &Path, result: &MeasurementResult) -> Result<Vec<PathBuf>> {
    let vac = output_dir.join(VAC_FILE);
    let jr = output_dir.join(JR_FILE);
    let joined = output_dir.join(OVERPOTENTIAL_FILE);
    let summary = output_dir.join(SUMMARY_FILE);

    write_vac_csv(&vac, &result.vac)?;
    write_jr_csv(&jr, &result.jr)?;
    write_overpotential_csv(&joined, &result.joined)?;
    write_summary_yaml(&summary, result)?;

    Ok(vec![vac, jr, joined, summary])
}
