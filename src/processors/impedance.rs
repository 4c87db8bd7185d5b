//! Real-axis crossing of impedance sweeps.
//!
//! The resistance of a sweep is the Zr value where the (sign-corrected) Zi
//! curve first crosses zero. The crossing is found between the first pair of
//! neighbouring points whose Zi values have opposite sign, by intersecting the
//! straight line through those two points with the real axis.

use thiserror::Error;

use crate::config::ImpedanceConfig;
use crate::core::loaders::ImpedanceSweep;

/// Errors that can occur while resolving a sweep's resistance.
#[derive(Debug, Error, PartialEq)]
pub enum ImpedanceError {
    #[error("impedance sweep has no samples")]
    EmptySeries,

    #[error("series length mismatch: Zr has {real_len} points, Zi has {imaginary_len}")]
    LengthMismatch { real_len: usize, imaginary_len: usize },

    #[error("imaginary impedance never changes sign across {points} points")]
    NoZeroCrossing { points: usize },
}

/// Result type for impedance resolution.
pub type Result<T> = std::result::Result<T, ImpedanceError>;

/// Where a sweep crosses the real axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroCrossing {
    /// Index `i` of the bracketing pair `(i, i + 1)`.
    pub index: usize,
    /// Interpolated Zr at Zi = 0, before clamping.
    pub raw_resistance: f64,
    /// Resistance after applying the positive floor.
    pub resistance: f64,
}

/// Root of the line through `(x0, y0)` and `(x1, y1)`.
///
/// Callers guarantee `y0 * y1 < 0`, so `y1 - y0` is never zero.
fn linear_root(x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    x0 - y0 * (x1 - x0) / (y1 - y0)
}

/// Find the first zero crossing of `imaginary` and interpolate `real` there.
///
/// The result is clamped to at least `floor`. A floor that is not finite and
/// positive falls back to `f64::MIN_POSITIVE`, so the resistance is always
/// strictly positive.
pub fn find_zero_crossing(real: &[f64], imaginary: &[f64], floor: f64) -> Result<ZeroCrossing> {
    if real.len() != imaginary.len() {
        return Err(ImpedanceError::LengthMismatch {
            real_len: real.len(),
            imaginary_len: imaginary.len(),
        });
    }
    if real.is_empty() {
        return Err(ImpedanceError::EmptySeries);
    }

    let index = imaginary
        .windows(2)
        .position(|pair| pair[0] * pair[1] < 0.0)
        .ok_or(ImpedanceError::NoZeroCrossing {
            points: imaginary.len(),
        })?;

    let raw_resistance = linear_root(
        real[index],
        imaginary[index],
        real[index + 1],
        imaginary[index + 1],
    );

    let floor = if floor.is_finite() && floor > 0.0 {
        floor
    } else {
        f64::MIN_POSITIVE
    };

    Ok(ZeroCrossing {
        index,
        raw_resistance,
        resistance: raw_resistance.max(floor),
    })
}

/// Resolve the resistance of a loaded sweep.
pub fn resolve_resistance(sweep: &ImpedanceSweep, config: &ImpedanceConfig) -> Result<ZeroCrossing> {
    find_zero_crossing(&sweep.real, &sweep.imaginary, config.resistance_floor)
}
