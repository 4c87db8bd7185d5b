//! Aggregation, joining and Tafel analysis of reduced measurements.
//!
//! Repeated measurements at the same nominal current are averaged into a
//! voltage table (VAC) and a resistance table (JR). Currents present in both
//! tables are joined and converted to IR-corrected overpotentials, which are
//! then fitted against log10(current).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Thermodynamic reference potential of the reaction (V).
pub const THERMODYNAMIC_POTENTIAL: f64 = 1.23;

/// Electrons transferred per reaction event.
pub const ELECTRON_STOICHIOMETRY: f64 = 4.0;

/// Errors that can occur during dataset analysis.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Tafel fit needs at least 2 joined currents, found {rows}")]
    DegenerateJoin { rows: usize },

    #[error("Tafel fit needs positive currents, found {current}")]
    NonPositiveCurrent { current: f64 },
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Grouping key for nominal currents.
///
/// Keys compare by exact value. Currents come straight from parsing the
/// decimal text in file names, so equal decimals always produce equal keys;
/// `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentKey(f64);

impl CurrentKey {
    pub fn new(current: f64) -> Self {
        Self(if current == 0.0 { 0.0 } else { current })
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for CurrentKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CurrentKey {}

impl PartialOrd for CurrentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CurrentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Steady-state potential of one transient scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatingPoint {
    /// Nominal current from the file name.
    pub current: f64,
    /// Mean plateau potential.
    pub potential: f64,
    /// Mean plateau current as measured by the instrument.
    pub measured_current: f64,
    pub source: Option<PathBuf>,
}

/// Resistance of one impedance sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResistancePoint {
    /// Nominal current from the file name.
    pub current: f64,
    pub resistance: f64,
    pub source: Option<PathBuf>,
}

/// One row of the aggregated voltage table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageRow {
    pub current: f64,
    pub potential: f64,
    pub measured_current: f64,
    /// Number of scans averaged into this row.
    pub repeats: usize,
}

/// One row of the aggregated resistance table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResistanceRow {
    pub current: f64,
    pub resistance: f64,
    /// Number of sweeps averaged into this row.
    pub repeats: usize,
}

/// A current present in both tables, with its overpotential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub current: f64,
    pub potential: f64,
    pub resistance: f64,
    pub overpotential: f64,
}

/// Linear fit of overpotential against log10(current).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TafelFit {
    /// Tafel slope (V per decade).
    pub slope: f64,
    /// Overpotential at a current of 1.
    pub intercept: f64,
    /// Number of joined rows in the fit.
    pub points: usize,
}

/// IR-corrected overpotential at one operating point.
#[inline]
pub fn overpotential(potential: f64, current: f64, resistance: f64) -> f64 {
    potential - ELECTRON_STOICHIOMETRY * current * resistance - THERMODYNAMIC_POTENTIAL
}

/// Group `(key, values)` pairs and average each value column per key.
fn group_means<const N: usize>(
    items: impl IntoIterator<Item = (f64, [f64; N])>,
) -> BTreeMap<CurrentKey, ([f64; N], usize)> {
    let mut groups: BTreeMap<CurrentKey, ([f64; N], usize)> = BTreeMap::new();

    for (current, values) in items {
        let entry = groups
            .entry(CurrentKey::new(current))
            .or_insert(([0.0; N], 0));
        for (sum, value) in entry.0.iter_mut().zip(values) {
            *sum += value;
        }
        entry.1 += 1;
    }

    for (sums, count) in groups.values_mut() {
        for sum in sums.iter_mut() {
            *sum /= *count as f64;
        }
    }

    groups
}

/// Average operating points per nominal current, sorted by current.
pub fn aggregate_operating_points(points: &[OperatingPoint]) -> Vec<VoltageRow> {
    group_means(
        points
            .iter()
            .map(|p| (p.current, [p.potential, p.measured_current])),
    )
    .into_iter()
    .map(|(key, ([potential, measured_current], repeats))| VoltageRow {
        current: key.value(),
        potential,
        measured_current,
        repeats,
    })
    .collect()
}

/// Average resistance points per nominal current, sorted by current.
pub fn aggregate_resistance_points(points: &[ResistancePoint]) -> Vec<ResistanceRow> {
    group_means(points.iter().map(|p| (p.current, [p.resistance])))
        .into_iter()
        .map(|(key, ([resistance], repeats))| ResistanceRow {
            current: key.value(),
            resistance,
            repeats,
        })
        .collect()
}

/// Inner-join the two tables on nominal current and compute overpotentials.
///
/// Output is ordered by current.
pub fn join_tables(vac: &[VoltageRow], jr: &[ResistanceRow]) -> Vec<JoinedRecord> {
    let resistances: BTreeMap<CurrentKey, f64> = jr
        .iter()
        .map(|row| (CurrentKey::new(row.current), row.resistance))
        .collect();

    let mut joined: Vec<JoinedRecord> = vac
        .iter()
        .filter_map(|row| {
            let resistance = *resistances.get(&CurrentKey::new(row.current))?;
            Some(JoinedRecord {
                current: row.current,
                potential: row.potential,
                resistance,
                overpotential: overpotential(row.potential, row.current, resistance),
            })
        })
        .collect();

    joined.sort_by(|a, b| a.current.total_cmp(&b.current));
    joined
}

/// Least-squares fit of overpotential against log10(current).
pub fn fit_tafel(records: &[JoinedRecord]) -> Result<TafelFit> {
    if records.len() < 2 {
        return Err(AnalysisError::DegenerateJoin {
            rows: records.len(),
        });
    }

    if let Some(bad) = records.iter().find(|r| !(r.current > 0.0)) {
        return Err(AnalysisError::NonPositiveCurrent {
            current: bad.current,
        });
    }

    let n = records.len() as f64;
    let xs: Vec<f64> = records.iter().map(|r| r.current.log10()).collect();
    let ys: Vec<f64> = records.iter().map(|r| r.overpotential).collect();

    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (sxy, sxx) = xs
        .iter()
        .zip(&ys)
        .fold((0.0, 0.0), |(sxy, sxx), (&x, &y)| {
            let dx = x - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });

    // Distinct keys can still collapse to one log value only through rounding
    if sxx == 0.0 {
        return Err(AnalysisError::DegenerateJoin {
            rows: records.len(),
        });
    }

    let slope = sxy / sxx;
    Ok(TafelFit {
        slope,
        intercept: mean_y - slope * mean_x,
        points: records.len(),
    })
}

/// Tables derived from one set of reduced measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetAnalysis {
    pub vac: Vec<VoltageRow>,
    pub jr: Vec<ResistanceRow>,
    pub joined: Vec<JoinedRecord>,
    /// Fit result, or why the slope is undefined.
    pub tafel: Result<TafelFit>,
}

impl DatasetAnalysis {
    /// Overpotentials of the joined rows, in current order.
    pub fn overpotentials(&self) -> Vec<f64> {
        self.joined.iter().map(|r| r.overpotential).collect()
    }
}

/// Aggregate, join and fit in one step.
pub fn analyze_dataset(points: &[OperatingPoint], resistances: &[ResistancePoint]) -> DatasetAnalysis {
    let vac = aggregate_operating_points(points);
    let jr = aggregate_resistance_points(resistances);
    let joined = join_tables(&vac, &jr);
    let tafel = fit_tafel(&joined);

    DatasetAnalysis {
        vac,
        jr,
        joined,
        tafel,
    }
}
