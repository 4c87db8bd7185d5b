//! Data loaders for instrument CSV exports.
//!
//! This module provides:
//! - Filename classification into transient scans and impedance sweeps
//! - Header-less three-column parsers for both export formats

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns in {path} at row {row}: expected 3, found {found}")]
    MissingColumns { path: PathBuf, row: usize, found: usize },

    #[error("Parse error in {path} at row {row}: {value:?} is not a number")]
    ParseError { path: PathBuf, row: usize, value: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Measurement type inferred from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Galvanostatic transient scan (`TRScan` ... `CP`)
    TransientScan,
    /// Impedance sweep (`EIS` ... `Acm2.csv`)
    ImpedanceSweep,
    /// Anything else found in the folder
    Unrecognized,
}

/// Classify a file by its name.
///
/// A name matching both conventions is treated as a transient scan.
pub fn classify_file(file_name: &str) -> FileCategory {
    if !has_csv_extension(file_name) {
        return FileCategory::Unrecognized;
    }

    if file_name.contains("TRScan") && file_name.contains("CP") {
        FileCategory::TransientScan
    } else if file_name.contains("EIS") && file_name.ends_with("Acm2.csv") {
        FileCategory::ImpedanceSweep
    } else {
        FileCategory::Unrecognized
    }
}

/// Returns true for names ending in `.csv` (any case).
pub fn has_csv_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Time-domain potential response recorded at a constant nominal current.
#[derive(Debug, Clone)]
pub struct TransientScan {
    /// Sample times.
    pub time: Vec<f64>,
    /// Potential samples (V).
    pub potential: Vec<f64>,
    /// Measured current samples.
    pub current: Vec<f64>,
    /// Current encoded in the file name.
    pub nominal_current: f64,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl TransientScan {
    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.potential.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.potential.is_empty()
    }
}

/// Impedance sweep with the imaginary part in the `+Zi` convention.
#[derive(Debug, Clone)]
pub struct ImpedanceSweep {
    /// Real impedance (Zr).
    pub real: Vec<f64>,
    /// Imaginary impedance (Zi), sign-corrected on load.
    pub imaginary: Vec<f64>,
    /// Third export column, carried through unchanged.
    pub aux: Vec<f64>,
    /// Current encoded in the file name.
    pub nominal_current: f64,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl ImpedanceSweep {
    /// Returns the number of frequency points.
    #[inline]
    pub fn len(&self) -> usize {
        self.real.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }
}

/// Read every row of a header-less three-column numeric CSV.
fn read_three_columns(path: &Path) -> Result<Vec<[f64; 3]>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(BufReader::new(file));

    let mut rows = Vec::with_capacity(1024);

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        // Blank trailing lines come through as a single empty field
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        if record.len() < 3 {
            return Err(LoaderError::MissingColumns {
                path: path.to_path_buf(),
                row,
                found: record.len(),
            });
        }

        let mut values = [0.0f64; 3];
        for (i, value) in values.iter_mut().enumerate() {
            let field = record.get(i).unwrap_or_default();
            *value = field.parse().map_err(|_| LoaderError::ParseError {
                path: path.to_path_buf(),
                row,
                value: field.to_string(),
            })?;
        }
        rows.push(values);
    }

    Ok(rows)
}

/// Load a transient scan export.
///
/// Columns are time, potential and current, without a header row. An empty
/// file yields an empty scan; rejecting it is left to the reducer.
pub fn load_transient_scan<P: AsRef<Path>>(path: P, nominal_current: f64) -> Result<TransientScan> {
    let path = path.as_ref();
    let rows = read_three_columns(path)?;

    let mut scan = TransientScan {
        time: Vec::with_capacity(rows.len()),
        potential: Vec::with_capacity(rows.len()),
        current: Vec::with_capacity(rows.len()),
        nominal_current,
        source_path: Some(path.to_path_buf()),
    };

    for [t, v, j] in rows {
        scan.time.push(t);
        scan.potential.push(v);
        scan.current.push(j);
    }

    Ok(scan)
}

/// Load an impedance sweep export.
///
/// Columns are Zr, Zi and an auxiliary value, without a header row. When
/// `invert_imaginary` is set the instrument's `-Zi` column is negated.
pub fn load_impedance_sweep<P: AsRef<Path>>(
    path: P,
    nominal_current: f64,
    invert_imaginary: bool,
) -> Result<ImpedanceSweep> {
    let path = path.as_ref();
    let rows = read_three_columns(path)?;
    let sign = if invert_imaginary { -1.0 } else { 1.0 };

    let mut sweep = ImpedanceSweep {
        real: Vec::with_capacity(rows.len()),
        imaginary: Vec::with_capacity(rows.len()),
        aux: Vec::with_capacity(rows.len()),
        nominal_current,
        source_path: Some(path.to_path_buf()),
    };

    for [zr, zi, aux] in rows {
        sweep.real.push(zr);
        sweep.imaginary.push(sign * zi);
        sweep.aux.push(aux);
    }

    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_classify_transient_scan() {
        assert_eq!(
            classify_file("DateTimeKeyStart_2024_03_01_10_00_00_DateTimeKeyEndTRScan_CP_ 2.5A.csv"),
            FileCategory::TransientScan
        );
    }

    #[test]
    fn test_classify_impedance_sweep() {
        assert_eq!(classify_file("run_EIS 0.5Acm2.csv"), FileCategory::ImpedanceSweep);
        // EIS files must end in Acm2.csv
        assert_eq!(classify_file("run_EIS 0.5A.csv"), FileCategory::Unrecognized);
    }

    #[test]
    fn test_classify_requires_csv() {
        assert_eq!(classify_file("TRScan_CP_1A.txt"), FileCategory::Unrecognized);
        assert_eq!(classify_file("notes.csv"), FileCategory::Unrecognized);
        assert_eq!(classify_file("TRScan_OCV.csv"), FileCategory::Unrecognized);
    }

    #[test]
    fn test_classify_both_conventions_prefers_transient() {
        assert_eq!(classify_file("TRScan_CP_EIS_1Acm2.csv"), FileCategory::TransientScan);
    }

    #[test]
    fn test_load_transient_scan() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.0,1.50,0.99").unwrap();
        writeln!(file, "0.1, 1.55 ,1.01").unwrap();
        writeln!(file, "0.2,1.60,1.00").unwrap();
        file.flush().unwrap();

        let scan = load_transient_scan(file.path(), 1.0)?;
        assert_eq!(scan.len(), 3);
        assert_eq!(scan.time[2], 0.2);
        assert_eq!(scan.potential[1], 1.55);
        assert_eq!(scan.current[0], 0.99);
        assert_eq!(scan.nominal_current, 1.0);

        Ok(())
    }

    #[test]
    fn test_load_empty_transient_scan() -> Result<()> {
        let file = NamedTempFile::new().unwrap();
        let scan = load_transient_scan(file.path(), 1.0)?;
        assert!(scan.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_impedance_sweep_inverts_imaginary() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.10,0.02,1000").unwrap();
        writeln!(file, "0.12,-0.01,500").unwrap();
        file.flush().unwrap();

        let sweep = load_impedance_sweep(file.path(), 0.5, true)?;
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep.imaginary, vec![-0.02, 0.01]);
        assert_eq!(sweep.aux[1], 500.0);

        let raw = load_impedance_sweep(file.path(), 0.5, false)?;
        assert_eq!(raw.imaginary, vec![0.02, -0.01]);

        Ok(())
    }

    #[test]
    fn test_load_rejects_non_numeric() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "time,potential,current").unwrap();
        file.flush().unwrap();

        match load_transient_scan(file.path(), 1.0) {
            Err(LoaderError::ParseError { row, value, .. }) => {
                assert_eq!(row, 0);
                assert_eq!(value, "time");
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_short_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.0,1.0,1.0").unwrap();
        writeln!(file, "0.1,1.0").unwrap();
        file.flush().unwrap();

        match load_transient_scan(file.path(), 1.0) {
            Err(LoaderError::MissingColumns { row, found, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(found, 2);
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }
}
