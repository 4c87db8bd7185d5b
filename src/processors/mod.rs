//! Data processing modules.

pub mod currents;
pub mod impedance;
pub mod ingest;
pub mod overpotential;
pub mod timestamp;
pub mod transient;

// Re-export key types for convenience
pub use currents::{extract_current, impedance_current, transient_current, CurrentMatch};
pub use impedance::{find_zero_crossing, resolve_resistance, ImpedanceError, ZeroCrossing};
pub use ingest::{ingest_folder, Diagnostic, IngestError, MeasurementResult, TimeWindow};
pub use overpotential::{
    aggregate_operating_points, aggregate_resistance_points, analyze_dataset, fit_tafel,
    join_tables, overpotential, AnalysisError, JoinedRecord, OperatingPoint, ResistancePoint,
    ResistanceRow, TafelFit, VoltageRow,
};
pub use timestamp::{
    format_tag, normalize_directory, parse_tag, resolve_timestamp, NormalizeReport, RenamedFile,
    TimestampError,
};
pub use transient::{reduce_scan, reduce_steady_state, SteadyState, TransientError};
