//! Configuration types for the cycler pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading or writing a config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Names of the columns the pipeline needs from a cycler log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Elapsed test time in seconds
    #[serde(default = "default_time_column")]
    pub time: String,

    /// Raw (possibly corrupted) cycle counter
    #[serde(default = "default_cycle_column")]
    pub cycle: String,

    /// Discharge capacity channel used for peak detection
    #[serde(default = "default_discharge_column")]
    pub discharge: String,
}

fn default_time_column() -> String {
    "time_s".to_string()
}

fn default_cycle_column() -> String {
    "cycleNumber".to_string()
}

fn default_discharge_column() -> String {
    "QDischarge_mA_h".to_string()
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            time: default_time_column(),
            cycle: default_cycle_column(),
            discharge: default_discharge_column(),
        }
    }
}

/// Configuration for discharge-capacity peak detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Minimum capacity (mAh) for a local maximum to count as a peak
    #[serde(default = "default_min_height")]
    pub min_height: f64,

    /// Minimum separation between accepted peaks, in samples
    #[serde(default = "default_min_distance")]
    pub min_distance: usize,

    /// Value written to every row when no peak is found (empty cell if unset)
    #[serde(default)]
    pub fallback_value: Option<f64>,
}

fn default_min_height() -> f64 {
    2400.0
}

fn default_min_distance() -> usize {
    10_000
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            min_height: default_min_height(),
            min_distance: default_min_distance(),
            fallback_value: None,
        }
    }
}

/// Configuration for directory batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Regex matched against file names to select cycler logs
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Suffix appended to the file stem of each output
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

fn default_file_pattern() -> String {
    r"^VAH\d+\.csv$".to_string()
}

fn default_output_suffix() -> String {
    "_cleaned".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            file_pattern: default_file_pattern(),
            output_suffix: default_output_suffix(),
        }
    }
}

/// Configuration for per-cycle feature aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Cycles with fewer rows than this are treated as incomplete and skipped
    #[serde(default = "default_min_rows_per_cycle")]
    pub min_rows_per_cycle: usize,
}

fn default_min_rows_per_cycle() -> usize {
    10
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_rows_per_cycle: default_min_rows_per_cycle(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub peaks: PeakConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub features: FeatureConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_peak_config() {
        let config = PeakConfig::default();
        assert_eq!(config.min_height, 2400.0);
        assert_eq!(config.min_distance, 10_000);
        assert!(config.fallback_value.is_none());
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.columns.cycle, "cycleNumber");
        assert_eq!(config.columns.discharge, "QDischarge_mA_h");
        assert_eq!(config.features.min_rows_per_cycle, 10);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "peaks:\n  min_height: 2000.0\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.peaks.min_height, 2000.0);
        assert_eq!(config.peaks.min_distance, 10_000);
        assert_eq!(config.columns, ColumnConfig::default());
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = PipelineConfig::default();
        config.peaks.fallback_value = Some(2500.0);
        config.batch.output_suffix = "_fixed".to_string();

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_config_file() {
        let result = PipelineConfig::from_yaml("/nonexistent/config.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
