//! Folder ingestion: from a directory of exports to a measurement result.
//!
//! Stages run in a fixed order:
//! 1. tag untagged files (the only filesystem mutation)
//! 2. list the folder again and resolve each file's timestamp
//! 3. keep files inside the window and classify them by name
//! 4. parse nominal currents; unparseable names go to the missing list
//! 5. load and reduce each file (in parallel, collected in path order)
//! 6. aggregate, join and fit
//!
//! File-level problems never abort the batch. They are collected as
//! [`Diagnostic`]s next to whatever could still be computed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::core::loaders::{classify_file, load_impedance_sweep, load_transient_scan, FileCategory};
use crate::processors::currents::{extract_current, CurrentMatch};
use crate::processors::impedance::{resolve_resistance, ImpedanceError};
use crate::processors::overpotential::{
    analyze_dataset, AnalysisError, JoinedRecord, OperatingPoint, ResistancePoint, ResistanceRow,
    TafelFit, VoltageRow,
};
use crate::processors::timestamp::{
    list_csv_files, normalize_directory, resolve_timestamp, NormalizeReport, RenamedFile,
    TimestampError,
};
use crate::processors::transient::{reduce_scan, TransientError};

/// Errors that stop ingestion of a whole folder.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error(
        "Measurement incomplete: {} file(s) without a parseable current, {} diagnostic(s)",
        .missing.len(),
        .diagnostics.len()
    )]
    Incomplete {
        missing: Vec<PathBuf>,
        diagnostics: Vec<Diagnostic>,
    },
}

/// Result type for ingestion.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Half-open acquisition window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(IngestError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// A problem recorded while ingesting, with the file it concerns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No current pattern matched the file name.
    UnparseableFilename { path: PathBuf },
    /// The file held no samples.
    EmptySeries { path: PathBuf },
    /// The impedance sweep never crosses the real axis.
    NoZeroCrossing { path: PathBuf },
    /// The file could not be read or parsed.
    Unreadable { path: PathBuf, reason: String },
    /// The file has no timestamp tag and could not be renamed.
    Untagged { path: PathBuf, reason: String },
    /// Fewer than two currents survived the join.
    DegenerateJoin { rows: usize },
    /// A joined current cannot be placed on a log axis.
    NonPositiveCurrent { current: f64 },
}

impl Diagnostic {
    /// The file this diagnostic refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Diagnostic::UnparseableFilename { path }
            | Diagnostic::EmptySeries { path }
            | Diagnostic::NoZeroCrossing { path }
            | Diagnostic::Unreadable { path, .. }
            | Diagnostic::Untagged { path, .. } => Some(path),
            Diagnostic::DegenerateJoin { .. } | Diagnostic::NonPositiveCurrent { .. } => None,
        }
    }
}

impl From<AnalysisError> for Diagnostic {
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::DegenerateJoin { rows } => Diagnostic::DegenerateJoin { rows },
            AnalysisError::NonPositiveCurrent { current } => {
                Diagnostic::NonPositiveCurrent { current }
            }
        }
    }
}

/// A file inside the window with a recognized measurement type.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub category: FileCategory,
}

/// Everything computed from one folder and window.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResult {
    /// Mean potential per nominal current.
    pub vac: Vec<VoltageRow>,
    /// Mean resistance per nominal current.
    pub jr: Vec<ResistanceRow>,
    /// Currents present in both tables.
    pub joined: Vec<JoinedRecord>,
    /// Overpotentials of `joined`, in the same order.
    pub overpotentials: Vec<f64>,
    /// `None` when fewer than two currents joined.
    pub tafel: Option<TafelFit>,
    /// In-window files whose current could not be parsed.
    pub missing: Vec<PathBuf>,
    /// Every file-level and dataset-level problem, grouped by pipeline stage
    /// and in path order within each stage.
    pub diagnostics: Vec<Diagnostic>,
    /// In-window CSV files that are neither scans nor sweeps.
    pub unrecognized: Vec<PathBuf>,
    /// Files renamed by the tagging pre-pass.
    pub renamed: Vec<RenamedFile>,
    /// CSV files skipped for lying outside the window.
    pub out_of_window: usize,
}

impl MeasurementResult {
    /// Tafel slope, if one could be fitted.
    pub fn tafel_slope(&self) -> Option<f64> {
        self.tafel.map(|fit| fit.slope)
    }

    /// True when no file went missing and the slope is defined.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.tafel.is_some()
    }

    /// Turn an incomplete result into an error carrying its diagnostics.
    pub fn into_complete(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(IngestError::Incomplete {
                missing: self.missing,
                diagnostics: self.diagnostics,
            })
        }
    }
}

/// Outcome of loading and reducing one file.
enum FileOutcome {
    Voltage(OperatingPoint),
    Resistance(ResistancePoint),
    Failed(Diagnostic),
}

/// Resolve, filter and classify the files of a folder.
///
/// Returns the candidates plus the unrecognized files, the number of files
/// outside the window and any diagnostics raised on the way.
fn discover(
    files: Vec<PathBuf>,
    window: &TimeWindow,
    untaggable: &HashSet<PathBuf>,
) -> (Vec<CandidateFile>, Vec<PathBuf>, usize, Vec<Diagnostic>) {
    let mut candidates = Vec::with_capacity(files.len());
    let mut unrecognized = Vec::new();
    let mut out_of_window = 0;
    let mut diagnostics = Vec::new();

    for path in files {
        if untaggable.contains(&path) {
            unrecognized.push(path);
            continue;
        }

        let resolved = match resolve_timestamp(&path) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                diagnostics.push(Diagnostic::Unreadable {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                unrecognized.push(path);
                continue;
            }
        };

        if !window.contains(resolved.timestamp) {
            out_of_window += 1;
            continue;
        }

        let category = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(classify_file)
            .unwrap_or(FileCategory::Unrecognized);

        if category == FileCategory::Unrecognized {
            debug!("Unrecognized file in window: {}", path.display());
            unrecognized.push(path);
            continue;
        }

        candidates.push(CandidateFile {
            path,
            timestamp: resolved.timestamp,
            category,
        });
    }

    (candidates, unrecognized, out_of_window, diagnostics)
}

/// Attach a nominal current to each candidate, splitting off unparseable names.
fn assign_currents(
    candidates: Vec<CandidateFile>,
) -> (Vec<(CandidateFile, CurrentMatch)>, Vec<PathBuf>) {
    let mut parsed = Vec::with_capacity(candidates.len());
    let mut missing = Vec::new();

    for candidate in candidates {
        let current = candidate
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| extract_current(candidate.category, name));

        match current {
            Some(current) => {
                debug!(
                    "{}: current {} via {}",
                    candidate.path.display(),
                    current.value,
                    current.pattern
                );
                parsed.push((candidate, current));
            }
            None => {
                warn!("No current found in file name: {}", candidate.path.display());
                missing.push(candidate.path);
            }
        }
    }

    (parsed, missing)
}

/// Load one file and reduce it to a single observation.
fn process_file(
    candidate: &CandidateFile,
    current: &CurrentMatch,
    config: &AnalysisConfig,
) -> FileOutcome {
    let path = candidate.path.clone();

    match candidate.category {
        FileCategory::TransientScan => {
            let scan = match load_transient_scan(&path, current.value) {
                Ok(scan) => scan,
                Err(e) => {
                    return FileOutcome::Failed(Diagnostic::Unreadable {
                        path,
                        reason: e.to_string(),
                    })
                }
            };
            match reduce_scan(&scan, &config.reduction) {
                Ok(state) => FileOutcome::Voltage(OperatingPoint {
                    current: current.value,
                    potential: state.potential,
                    measured_current: state.current,
                    source: Some(path),
                }),
                Err(TransientError::EmptySeries) => {
                    FileOutcome::Failed(Diagnostic::EmptySeries { path })
                }
                Err(e) => FileOutcome::Failed(Diagnostic::Unreadable {
                    path,
                    reason: e.to_string(),
                }),
            }
        }
        FileCategory::ImpedanceSweep => {
            let sweep = match load_impedance_sweep(
                &path,
                current.value,
                config.impedance.invert_imaginary,
            ) {
                Ok(sweep) => sweep,
                Err(e) => {
                    return FileOutcome::Failed(Diagnostic::Unreadable {
                        path,
                        reason: e.to_string(),
                    })
                }
            };
            match resolve_resistance(&sweep, &config.impedance) {
                Ok(crossing) => FileOutcome::Resistance(ResistancePoint {
                    current: current.value,
                    resistance: crossing.resistance,
                    source: Some(path),
                }),
                Err(ImpedanceError::EmptySeries) => {
                    FileOutcome::Failed(Diagnostic::EmptySeries { path })
                }
                Err(ImpedanceError::NoZeroCrossing { .. }) => {
                    FileOutcome::Failed(Diagnostic::NoZeroCrossing { path })
                }
                Err(e) => FileOutcome::Failed(Diagnostic::Unreadable {
                    path,
                    reason: e.to_string(),
                }),
            }
        }
        FileCategory::Unrecognized => FileOutcome::Failed(Diagnostic::Unreadable {
            path,
            reason: "unrecognized file type".to_string(),
        }),
    }
}

/// Ingest every measurement in `directory` acquired within `window`.
///
/// Untagged files are renamed first when `config.ingest.rename_untagged` is
/// set. The returned result always holds everything that could be computed;
/// use [`MeasurementResult::into_complete`] to treat gaps as an error.
pub fn ingest_folder(
    directory: &Path,
    window: &TimeWindow,
    config: &AnalysisConfig,
) -> Result<MeasurementResult> {
    if !directory.is_dir() {
        return Err(IngestError::DirectoryNotFound(directory.to_path_buf()));
    }

    let report = if config.ingest.rename_untagged {
        normalize_directory(directory, false)?
    } else {
        NormalizeReport::default()
    };
    if !report.renamed.is_empty() {
        info!("Tagged {} file(s) with their modification time", report.renamed.len());
    }

    let mut diagnostics: Vec<Diagnostic> = report
        .failed
        .iter()
        .map(|failure| Diagnostic::Untagged {
            path: failure.path.clone(),
            reason: failure.reason.clone(),
        })
        .collect();
    let untaggable: HashSet<PathBuf> = report.failed.iter().map(|f| f.path.clone()).collect();

    // Listing again only after every rename has finished
    let files = list_csv_files(directory)?;
    let (candidates, unrecognized, out_of_window, discover_diagnostics) =
        discover(files, window, &untaggable);
    diagnostics.extend(discover_diagnostics);

    info!(
        "{} candidate file(s) in window, {} outside, {} unrecognized",
        candidates.len(),
        out_of_window,
        unrecognized.len()
    );

    let (parsed, missing) = assign_currents(candidates);
    diagnostics.extend(
        missing
            .iter()
            .map(|path| Diagnostic::UnparseableFilename { path: path.clone() }),
    );

    let outcomes: Vec<FileOutcome> = parsed
        .par_iter()
        .map(|(candidate, current)| process_file(candidate, current, config))
        .collect();

    let mut points = Vec::new();
    let mut resistances = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Voltage(point) => points.push(point),
            FileOutcome::Resistance(point) => resistances.push(point),
            FileOutcome::Failed(diagnostic) => {
                warn!("Excluded from analysis: {:?}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
    }

    let analysis = analyze_dataset(&points, &resistances);
    let overpotentials = analysis.overpotentials();
    let tafel = match analysis.tafel {
        Ok(fit) => {
            info!("Tafel slope {:.6} from {} current(s)", fit.slope, fit.points);
            Some(fit)
        }
        Err(e) => {
            warn!("Tafel slope undefined: {}", e);
            diagnostics.push(e.into());
            None
        }
    };

    Ok(MeasurementResult {
        vac: analysis.vac,
        jr: analysis.jr,
        joined: analysis.joined,
        overpotentials,
        tafel,
        missing,
        diagnostics,
        unrecognized,
        renamed: report.renamed,
        out_of_window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::timestamp::{format_tag, local_timestamp, parse_tag, tagged_name};
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::fs::{self, File};
    use std::io::Write;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn morning() -> TimeWindow {
        TimeWindow::new(at(8, 0), at(12, 0)).unwrap()
    }

    fn write_rows(dir: &Path, name: &str, rows: &[[f64; 3]]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for [a, b, c] in rows {
            writeln!(file, "{},{},{}", a, b, c).unwrap();
        }
        path
    }

    /// Transient scan with a constant plateau potential.
    fn write_scan(dir: &Path, time: NaiveDateTime, label: &str, potential: f64, current: f64) {
        let rows: Vec<[f64; 3]> = (0..80)
            .map(|i| {
                let v = if i < 30 { potential + 0.5 } else { potential };
                [i as f64, v, current]
            })
            .collect();
        write_rows(dir, &format!("{}TRScan_CP_{}", format_tag(&time), label), &rows);
    }

    /// Impedance sweep whose corrected Zi crosses zero at `resistance`.
    fn write_sweep(dir: &Path, time: NaiveDateTime, label: &str, resistance: f64) {
        // Raw exports store -Zi: positive here means below the real axis
        let rows = [
            [resistance - 0.02, 0.02, 10000.0],
            [resistance - 0.01, 0.01, 1000.0],
            [resistance + 0.01, -0.01, 100.0],
            [resistance + 0.02, 0.005, 10.0],
        ];
        write_rows(dir, &format!("{}{}", format_tag(&time), label), &rows);
    }

    fn joined_row(result: &MeasurementResult, current: f64) -> &JoinedRecord {
        result.joined.iter().find(|r| r.current == current).unwrap()
    }

    #[test]
    fn test_time_window_is_half_open() {
        let window = morning();
        assert!(window.contains(at(8, 0)));
        assert!(window.contains(at(11, 59)));
        assert!(!window.contains(at(12, 0)));
        assert!(!window.contains(at(7, 59)));
    }

    #[test]
    fn test_time_window_rejects_inverted_range() {
        assert!(matches!(
            TimeWindow::new(at(12, 0), at(8, 0)),
            Err(IngestError::InvalidWindow { .. })
        ));
        assert!(TimeWindow::new(at(8, 0), at(8, 0)).is_err());
    }

    #[test]
    fn test_end_to_end_overpotential() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_scan(dir, at(9, 0), " 1.0A.csv", 1.65, 1.0);
        write_scan(dir, at(9, 10), " 2.0A.csv", 1.75, 2.0);
        write_sweep(dir, at(9, 5), "EIS 1.0Acm2.csv", 0.05);
        write_sweep(dir, at(9, 15), "EIS 2.0Acm2.csv", 0.04);

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert!(result.is_complete(), "diagnostics: {:?}", result.diagnostics);
        assert_eq!(result.vac.len(), 2);
        assert_eq!(result.jr.len(), 2);
        assert_eq!(result.joined.len(), 2);

        let row = joined_row(&result, 1.0);
        assert!((row.potential - 1.65).abs() < 1e-9);
        assert!((row.resistance - 0.05).abs() < 1e-9);
        let expected = 1.65 - 4.0 * 1.0 * 0.05 - 1.23;
        assert!((row.overpotential - expected).abs() < 1e-9);
        assert!((result.overpotentials[0] - expected).abs() < 1e-9);

        let eta_2 = 1.75 - 4.0 * 2.0 * 0.04 - 1.23;
        let slope = (eta_2 - expected) / 2.0f64.log10();
        assert!((result.tafel_slope().unwrap() - slope).abs() < 1e-9);
    }

    #[test]
    fn test_repeats_are_averaged() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_scan(dir, at(9, 0), " 1.0A.csv", 1.60, 1.0);
        write_scan(dir, at(9, 1), "_1A.csv", 1.70, 1.0);
        write_scan(dir, at(9, 2), " 3A.csv", 1.80, 3.0);
        write_sweep(dir, at(9, 3), "EIS 1Acm2.csv", 0.05);
        write_sweep(dir, at(9, 4), "EIS1.00Acm2.csv", 0.07);
        write_sweep(dir, at(9, 5), "EIS 3.0Acm2.csv", 0.05);

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.vac[0].repeats, 2);
        assert!((result.vac[0].potential - 1.65).abs() < 1e-9);
        assert_eq!(result.jr[0].repeats, 2);
        assert!((result.jr[0].resistance - 0.06).abs() < 1e-9);
        assert_eq!(result.joined.len(), 2);
    }

    #[test]
    fn test_window_filters_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_scan(dir, at(9, 0), " 1A.csv", 1.6, 1.0);
        write_scan(dir, at(12, 0), " 2A.csv", 1.7, 2.0);
        write_scan(dir, at(7, 0), " 3A.csv", 1.8, 3.0);

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.out_of_window, 2);
        assert_eq!(result.vac.len(), 1);
        assert_eq!(result.vac[0].current, 1.0);
    }

    #[test]
    fn test_unparseable_current_is_reported_missing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_scan(dir, at(9, 0), " 1A.csv", 1.6, 1.0);
        write_scan(dir, at(9, 1), " 2A.csv", 1.7, 2.0);
        write_scan(dir, at(9, 2), "_OCV.csv", 1.2, 0.0);
        write_sweep(dir, at(9, 3), "EIS 1Acm2.csv", 0.05);
        write_sweep(dir, at(9, 4), "EIS 2Acm2.csv", 0.05);

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.missing.len(), 1);
        assert!(result.missing[0].to_string_lossy().ends_with("TRScan_CP__OCV.csv"));
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnparseableFilename { .. })));
        // Everything else is still computed
        assert!(result.tafel.is_some());
        assert!(!result.is_complete());

        match result.into_complete() {
            Err(IngestError::Incomplete { missing, .. }) => assert_eq!(missing.len(), 1),
            other => panic!("Expected Incomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_sweep_without_crossing_is_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_sweep(dir, at(9, 0), "EIS 1Acm2.csv", 0.05);
        write_rows(
            dir,
            &format!("{}EIS 2Acm2.csv", format_tag(&at(9, 1))),
            &[[0.1, 0.02, 100.0], [0.2, 0.01, 10.0]],
        );

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.jr.len(), 1);
        assert_eq!(result.jr[0].current, 1.0);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::NoZeroCrossing { .. })));
    }

    #[test]
    fn test_empty_scan_is_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_rows(dir, &format!("{}TRScan_CP 1A.csv", format_tag(&at(9, 0))), &[]);
        write_scan(dir, at(9, 1), " 2A.csv", 1.7, 2.0);

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.vac.len(), 1);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::EmptySeries { .. })));
    }

    #[test]
    fn test_degenerate_join_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_scan(dir, at(9, 0), " 1A.csv", 1.6, 1.0);
        write_scan(dir, at(9, 1), " 2A.csv", 1.7, 2.0);
        write_sweep(dir, at(9, 2), "EIS 1Acm2.csv", 0.05);

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.joined.len(), 1);
        assert_eq!(result.tafel, None);
        assert!(result
            .diagnostics
            .contains(&Diagnostic::DegenerateJoin { rows: 1 }));
        assert!(result.into_complete().is_err());
    }

    #[test]
    fn test_untagged_files_are_tagged_then_ingested() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let mtime: SystemTime = UNIX_EPOCH + Duration::from_secs(1_709_280_000);
        let local = local_timestamp(mtime);
        let window =
            TimeWindow::new(local - ChronoDuration::hours(1), local + ChronoDuration::hours(1))
                .unwrap();

        let path = write_rows(dir, "TRScan_CP 1A.csv", &[[0.0, 1.6, 1.0], [1.0, 1.6, 1.0]]);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let result = ingest_folder(dir, &window, &AnalysisConfig::default()).unwrap();

        assert_eq!(result.renamed.len(), 1);
        assert!(!path.exists());
        let new_name = result.renamed[0].to.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_tag(new_name), Some(local));
        assert_eq!(result.vac.len(), 1);

        // Second run finds nothing left to rename
        let again = ingest_folder(dir, &window, &AnalysisConfig::default()).unwrap();
        assert!(again.renamed.is_empty());
        assert_eq!(again.vac, result.vac);
    }

    #[test]
    fn test_rename_collision_is_skipped_as_untagged() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let mtime: SystemTime = UNIX_EPOCH + Duration::from_secs(1_709_280_000);
        let local = local_timestamp(mtime);
        let window =
            TimeWindow::new(local - ChronoDuration::hours(1), local + ChronoDuration::hours(1))
                .unwrap();

        let path = write_rows(dir, "TRScan_CP 1A.csv", &[[0.0, 9.9, 1.0], [1.0, 9.9, 1.0]]);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        // The tagged name is already taken by another scan
        write_rows(
            dir,
            &tagged_name(&local, "TRScan_CP 1A.csv"),
            &[[0.0, 1.6, 1.0], [1.0, 1.6, 1.0]],
        );

        let result = ingest_folder(dir, &window, &AnalysisConfig::default()).unwrap();

        assert!(path.exists());
        assert!(result.renamed.is_empty());
        assert_eq!(result.unrecognized, vec![path.clone()]);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Untagged { path: p, .. } if *p == path)));
        assert_eq!(result.vac.len(), 1);
        assert!((result.vac[0].potential - 1.6).abs() < 1e-9);
        assert!(result.jr.is_empty());
    }

    #[test]
    fn test_rename_disabled_uses_mtime_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let mtime: SystemTime = UNIX_EPOCH + Duration::from_secs(1_709_280_000);
        let local = local_timestamp(mtime);
        let window =
            TimeWindow::new(local - ChronoDuration::hours(1), local + ChronoDuration::hours(1))
                .unwrap();

        let path = write_rows(dir, "TRScan_CP 1A.csv", &[[0.0, 1.6, 1.0]]);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let mut config = AnalysisConfig::default();
        config.ingest.rename_untagged = false;

        let result = ingest_folder(dir, &window, &config).unwrap();
        assert!(result.renamed.is_empty());
        assert!(path.exists());
        assert_eq!(result.vac.len(), 1);
    }

    #[test]
    fn test_unrecognized_and_unreadable_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        write_rows(dir, &format!("{}notes.csv", format_tag(&at(9, 0))), &[]);
        let bad = dir.join(format!("{}TRScan_CP 1A.csv", format_tag(&at(9, 1))));
        fs::write(&bad, "time,potential,current\n0,1,1\n").unwrap();

        let result = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();

        assert_eq!(result.unrecognized.len(), 1);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::Unreadable { path, .. } if path == &bad)));
        assert!(result.vac.is_empty());
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        for (i, current) in [0.5, 1.0, 2.0, 4.0].into_iter().enumerate() {
            let minute = i as u32;
            let potential = 1.6 + 0.05 * i as f64;
            write_scan(dir, at(9, minute), &format!(" {}A.csv", current), potential, current);
            write_sweep(dir, at(10, minute), &format!("EIS {}Acm2.csv", current), 0.02);
        }

        let first = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();
        let second = ingest_folder(dir, &morning(), &AnalysisConfig::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.joined.len(), 4);
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = ingest_folder(
            &temp_dir.path().join("absent"),
            &morning(),
            &AnalysisConfig::default(),
        );
        assert!(matches!(result, Err(IngestError::DirectoryNotFound(_))));
    }
}
