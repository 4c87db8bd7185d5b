//! Steady-state reduction of galvanostatic transient scans.

use thiserror::Error;

use crate::config::ReductionConfig;
use crate::core::loaders::TransientScan;

/// Errors that can occur while reducing a scan.
#[derive(Debug, Error, PartialEq)]
pub enum TransientError {
    #[error("transient scan has no samples")]
    EmptySeries,

    #[error("series length mismatch: current has {current_len} samples, potential has {potential_len}")]
    LengthMismatch {
        current_len: usize,
        potential_len: usize,
    },
}

/// Result type for transient reduction.
pub type Result<T> = std::result::Result<T, TransientError>;

/// Plateau values of one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadyState {
    /// Mean measured current over the window.
    pub current: f64,
    /// Mean potential over the window.
    pub potential: f64,
    /// Number of samples averaged.
    pub samples: usize,
}

/// Average the last `min(window, N)` samples of both series.
///
/// A `window` of zero is treated as one.
pub fn reduce_steady_state(current: &[f64], potential: &[f64], window: usize) -> Result<SteadyState> {
    if current.len() != potential.len() {
        return Err(TransientError::LengthMismatch {
            current_len: current.len(),
            potential_len: potential.len(),
        });
    }
    if potential.is_empty() {
        return Err(TransientError::EmptySeries);
    }

    let n = potential.len();
    let take = window.max(1).min(n);
    let start = n - take;

    Ok(SteadyState {
        current: mean(&current[start..]),
        potential: mean(&potential[start..]),
        samples: take,
    })
}

/// Reduce a loaded scan with the configured window.
pub fn reduce_scan(scan: &TransientScan, config: &ReductionConfig) -> Result<SteadyState> {
    reduce_steady_state(&scan.current, &scan.potential, config.steady_state_samples)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
