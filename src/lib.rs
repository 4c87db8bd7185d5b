//! Overpotential and Tafel analysis of electrochemical measurement exports.
//!
//! This crate provides tools for:
//! - Tagging instrument exports with their acquisition timestamp
//! - Parsing nominal currents from hand-written file names
//! - Reducing galvanostatic transient scans to steady-state potentials
//! - Resolving charge-transfer resistance from impedance sweeps
//! - Joining both series into IR-corrected overpotentials and a Tafel slope
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use tafel_pipeline::{ingest_folder, AnalysisConfig, TimeWindow};
//!
//! let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let window = TimeWindow::new(
//!     day.and_hms_opt(8, 0, 0).unwrap(),
//!     day.and_hms_opt(12, 0, 0).unwrap(),
//! )
//! .unwrap();
//!
//! let result = ingest_folder("data".as_ref(), &window, &AnalysisConfig::default()).unwrap();
//! println!("Tafel slope: {:?}", result.tafel_slope());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{AnalysisConfig, ImpedanceConfig, IngestConfig, ReductionConfig};
pub use processors::ingest::{ingest_folder, Diagnostic, MeasurementResult, TimeWindow};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
