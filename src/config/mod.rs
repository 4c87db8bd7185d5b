//! Configuration types for the Tafel pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for directory ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Rename untagged CSV files by prefixing their modification-time tag.
    /// When disabled, untagged files are timed by mtime and left untouched.
    #[serde(default = "default_rename_untagged")]
    pub rename_untagged: bool,
}

fn default_rename_untagged() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rename_untagged: default_rename_untagged(),
        }
    }
}

/// Configuration for transient-scan reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Number of trailing samples averaged as the steady-state plateau
    #[serde(default = "default_steady_state_samples")]
    pub steady_state_samples: usize,
}

fn default_steady_state_samples() -> usize {
    50
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            steady_state_samples: default_steady_state_samples(),
        }
    }
}

/// Configuration for impedance sweep handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpedanceConfig {
    /// Smallest resistance reported by the zero-crossing resolver (ohms)
    #[serde(default = "default_resistance_floor")]
    pub resistance_floor: f64,

    /// Flip the sign of the imaginary column on load (instrument exports -Zi)
    #[serde(default = "default_invert_imaginary")]
    pub invert_imaginary: bool,
}

fn default_resistance_floor() -> f64 {
    1e-12
}

fn default_invert_imaginary() -> bool {
    true
}

impl Default for ImpedanceConfig {
    fn default() -> Self {
        Self {
            resistance_floor: default_resistance_floor(),
            invert_imaginary: default_invert_imaginary(),
        }
    }
}

/// Main analysis configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub reduction: ReductionConfig,

    #[serde(default)]
    pub impedance: ImpedanceConfig,
}

impl AnalysisConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
