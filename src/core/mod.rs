//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{FileCategory, ImpedanceSweep, LoaderError, TransientScan};
pub use writers::{write_measurement, WriteError};
