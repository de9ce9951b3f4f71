//! Repair pipeline for battery-cycler logs.
//!
//! Long cycling experiments are interrupted by reference tests and
//! restarts, which reset or rewind the logged cycle counter. This crate
//! provides tools for:
//! - Loading cycler CSV logs and locating test cycles from counter jumps
//! - Restoring a monotone cycle numbering over the regular cycles
//! - Extracting discharge-capacity peaks from test cycles and
//!   interpolating them over the whole log
//! - Aggregating per-cycle features and scoring capacity predictions
//! - Batch processing of whole directories in parallel
//!
//! # Example
//!
//! ```no_run
//! use cycler_pipeline::{config::PipelineConfig, processors::pipeline::process_file};
//! use std::path::Path;
//!
//! let config = PipelineConfig::default();
//! let report = process_file(Path::new("VAH01.csv"), Path::new("VAH01_cleaned.csv"), &config).unwrap();
//! println!("{} test cycles, {} peaks", report.test_cycles.len(), report.peaks_found());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{BatchConfig, ColumnConfig, FeatureConfig, PeakConfig, PipelineConfig};
pub use core::loaders::{AnnotatedTable, CycleTable};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
