//! Staged cycle-repair pipeline.
//!
//! The five stages run strictly in sequence over one in-memory table:
//!
//! 1. transition detection on the raw cycle counter
//! 2. test/regular classification
//! 3. renumbering of the regular subsequence
//! 4. merge back into the full series with forward/backward gap fill
//! 5. peak extraction on test rows and propagation over the full series
//!
//! Each stage returns new vectors. Output is only written once all stages
//! have succeeded. Files are independent, so a batch runs them in parallel
//! with rayon without any shared state.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ColumnConfig, PeakConfig, PipelineConfig};
use crate::core::loaders::{load_cycler_csv, AnnotatedTable, CycleTable, LoaderError};
use crate::core::writers::{write_annotated_csv, WriteError};

use super::classifier::classify;
use super::discovery::{file_pattern, find_cycler_files, output_path_for};
use super::merge::merge_and_fill;
use super::peaks::{extract_peaks, propagate_peaks, PeakRecord};
use super::renumber::renumber;
use super::transitions::{detect_test_cycles, find_transitions};

/// Errors that abort processing of a single file.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl PipelineError {
    /// True if the input lacked a required column.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Load {
                source: LoaderError::MissingColumns(_),
                ..
            }
        )
    }

    /// True if the input had no data rows.
    pub fn is_empty_input(&self) -> bool {
        matches!(
            self,
            PipelineError::Load {
                source: LoaderError::EmptyFile(_),
                ..
            }
        )
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// Total rows processed.
    pub rows: usize,
    /// Backward jumps found in the raw counter.
    pub drops: usize,
    /// Forward jumps found in the raw counter.
    pub rises: usize,
    /// Cycle numbers classified as test cycles, ascending.
    pub test_cycles: Vec<i64>,
    pub regular_rows: usize,
    pub test_rows: usize,
    /// Final cumulative correction applied to regular rows.
    pub offset: i64,
    /// Drops corrected within the regular subsequence.
    pub corrections: usize,
    /// Accepted capacity peaks.
    pub peaks: Vec<PeakRecord>,
}

impl PipelineReport {
    /// Number of peaks found; zero means the peak column is fill-only.
    #[inline]
    pub fn peaks_found(&self) -> usize {
        self.peaks.len()
    }
}

/// Run all stages over an in-memory table.
///
/// Never fails: every stage is total. An empty table yields an empty
/// result.
pub fn run_pipeline(table: CycleTable, config: &PeakConfig) -> (AnnotatedTable, PipelineReport) {
    let raw = table.cycle_number.clone();

    let transitions = find_transitions(&raw);
    let anomalies = detect_test_cycles(&raw, &transitions);
    let partition = classify(&raw, &anomalies);

    let renumbering = renumber(&partition.regular_values(&raw));
    let corrected = merge_and_fill(&partition, &renumbering.corrected, &raw);

    let peaks = extract_peaks(&table.time_s, &table.q_discharge, &partition, config);
    let peak_values = propagate_peaks(&table.time_s, &peaks, config.fallback_value);

    let report = PipelineReport {
        rows: raw.len(),
        drops: transitions.drops.len(),
        rises: transitions.rises.len(),
        test_cycles: anomalies.to_vec(),
        regular_rows: partition.regular.len(),
        test_rows: partition.test.len(),
        offset: renumbering.offset,
        corrections: renumbering.corrections,
        peaks,
    };

    let annotated = AnnotatedTable {
        table: table.with_cycle_numbers(corrected),
        raw_cycle_number: raw,
        is_test_cycle: partition.is_test,
        discharge_peak_value: peak_values,
    };

    (annotated, report)
}

/// Load a cycler log and run the pipeline on it without writing anything.
pub fn process_in_memory(
    input: &Path,
    columns: &ColumnConfig,
    peaks: &PeakConfig,
) -> std::result::Result<(AnnotatedTable, PipelineReport), PipelineError> {
    let table = load_cycler_csv(input, columns).map_err(|source| PipelineError::Load {
        path: input.to_path_buf(),
        source,
    })?;

    let name = input.display();
    log::info!("{}: loaded {} rows", name, table.len());

    let (annotated, report) = run_pipeline(table, peaks);

    log::info!(
        "{}: {} drops, {} rises, test cycles {:?}",
        name,
        report.drops,
        report.rises,
        report.test_cycles
    );
    log::info!(
        "{}: {} regular / {} test rows, {} corrections, total offset {}",
        name,
        report.regular_rows,
        report.test_rows,
        report.corrections,
        report.offset
    );
    if report.peaks.is_empty() {
        log::warn!(
            "{}: no discharge peaks at or above {} found; peak column is fill-only",
            name,
            peaks.min_height
        );
    } else {
        log::info!("{}: {} discharge peaks", name, report.peaks_found());
    }

    Ok((annotated, report))
}

/// Process one cycler log and write the annotated result.
///
/// # Arguments
///
/// * `input` - Raw cycler CSV
/// * `output` - Destination CSV (parent directories are created)
/// * `config` - Pipeline configuration
///
/// # Errors
///
/// Missing columns, an empty file, unparseable required cells and write
/// failures abort this file. Nothing is left at `output` in that case.
pub fn process_file(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> std::result::Result<PipelineReport, PipelineError> {
    let (annotated, report) = process_in_memory(input, &config.columns, &config.peaks)?;
    write_annotated_csv(output, &annotated)?;
    log::info!("{} -> {}", input.display(), output.display());
    Ok(report)
}

/// Result of one file in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: std::result::Result<PipelineReport, PipelineError>,
}

/// Process every matching log in `input_dir` in parallel.
///
/// A failure in one file is recorded in its outcome and does not affect
/// the others. `on_done` is called from worker threads as each file
/// finishes. Outcomes are returned in sorted input order.
///
/// # Errors
///
/// Fails only if the file pattern is invalid or `input_dir` cannot be read.
pub fn process_batch<F>(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    limit: Option<usize>,
    on_done: F,
) -> Result<Vec<BatchOutcome>>
where
    F: Fn(&BatchOutcome) + Sync,
{
    let pattern = file_pattern(&config.batch.file_pattern)?;
    let mut files = find_cycler_files(input_dir, &pattern)?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }

    log::info!(
        "Processing {} files from {}",
        files.len(),
        input_dir.display()
    );
    let start = Instant::now();

    let outcomes: Vec<BatchOutcome> = files
        .par_iter()
        .map(|input| {
            let output = output_path_for(input, output_dir, &config.batch.output_suffix);
            let result = process_file(input, &output, config);
            if let Err(e) = &result {
                log::error!("{}: {}", input.display(), e);
            }
            let outcome = BatchOutcome {
                input: input.clone(),
                output,
                result,
            };
            on_done(&outcome);
            outcome
        })
        .collect();

    log::info!("Batch finished in {:.2?}", start.elapsed());

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn is_non_decreasing(values: &[i64]) -> bool {
        values.windows(2).all(|w| w[0] <= w[1])
    }

    fn small_config() -> PeakConfig {
        PeakConfig {
            min_height: 2400.0,
            min_distance: 3,
            fallback_value: None,
        }
    }

    /// Two resumed runs with a reference test between them.
    ///
    /// Raw counter: 0 0 | 1 1 2 2 3 3 | 1 1 (test) | 2 2 3 3 4 4
    /// The drop 3 -> 1 flags cycles 1 and 3 as test cycles.
    fn resumed_table() -> CycleTable {
        let cycles = vec![0, 0, 1, 1, 2, 2, 3, 3, 1, 1, 2, 2, 3, 3, 4, 4];
        let time: Vec<f64> = (0..cycles.len()).map(|i| i as f64 * 10.0).collect();
        let mut q = vec![0.0; cycles.len()];
        q[1] = 2900.0;
        q[3] = 2950.0; // within min_distance of the first peak
        q[7] = 2800.0;
        q[9] = 2500.0;
        CycleTable::from_columns(time, cycles, q)
    }

    #[test]
    fn test_run_pipeline_corrects_regular_rows() {
        let (annotated, report) = run_pipeline(resumed_table(), &small_config());

        assert_eq!(report.drops, 1);
        assert_eq!(report.test_cycles, vec![0, 1, 3]);
        assert_eq!(report.regular_rows + report.test_rows, report.rows);

        let regular: Vec<i64> = annotated
            .is_test_cycle
            .iter()
            .zip(annotated.table.cycle_number.iter())
            .filter(|(&t, _)| !t)
            .map(|(_, &c)| c)
            .collect();
        assert!(is_non_decreasing(&regular));
        assert_eq!(regular, vec![2, 2, 2, 2, 4, 4]);
    }

    #[test]
    fn test_every_row_defined_after_pipeline() {
        let (annotated, report) = run_pipeline(resumed_table(), &small_config());

        assert!(report.peaks_found() > 0);
        assert_eq!(annotated.len(), report.rows);
        assert_eq!(annotated.is_test_cycle.len(), report.rows);
        assert!(annotated.discharge_peak_value.iter().all(Option::is_some));
        assert_eq!(annotated.raw_cycle_number, resumed_table().cycle_number);
    }

    #[test]
    fn test_peak_values_interpolated_between_peaks() {
        let (annotated, report) = run_pipeline(resumed_table(), &small_config());

        // test rows 0,1,2,3,6,7,8,9,12,13
        // test q = [0,2900,0,2950,0,2800,0,2500,0,0]
        // 2950 and 2500 fall within min_distance of the peak before them
        let rows: Vec<usize> = report.peaks.iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![1, 7]);

        let values: Vec<f64> = annotated
            .discharge_peak_value
            .iter()
            .map(|v| v.unwrap())
            .collect();
        let (t1, v1, t2, v2) = (10.0, 2900.0, 70.0, 2800.0);
        for (i, &t) in annotated.table.time_s.iter().enumerate() {
            if t > t1 && t < t2 {
                let expected = v1 + (v2 - v1) * (t - t1) / (t2 - t1);
                assert!((values[i] - expected).abs() < 1e-9);
            }
        }
        assert_eq!(values[0], 2900.0);
        assert_eq!(values[15], 2800.0);
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let (a, ra) = run_pipeline(resumed_table(), &small_config());
        let (b, rb) = run_pipeline(resumed_table(), &small_config());

        assert_eq!(ra, rb);
        assert_eq!(a.table.cycle_number, b.table.cycle_number);
        assert_eq!(a.is_test_cycle, b.is_test_cycle);
        let bits = |t: &AnnotatedTable| -> Vec<Option<u64>> {
            t.discharge_peak_value.iter().map(|v| v.map(f64::to_bits)).collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_no_peaks_is_not_fatal() {
        let table = CycleTable::from_columns(vec![0.0, 1.0, 2.0], vec![0, 1, 2], vec![0.0; 3]);
        let (annotated, report) = run_pipeline(table, &small_config());

        assert_eq!(report.peaks_found(), 0);
        assert!(annotated.discharge_peak_value.iter().all(Option::is_none));
    }

    fn write_log(path: &Path, cycles: &[i64]) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "time_s,cycleNumber,Ecell_V,QDischarge_mA_h").unwrap();
        for (i, c) in cycles.iter().enumerate() {
            let q = if i % 4 == 2 { 3000.0 } else { 0.0 };
            writeln!(file, "{},{},3.7,{}", i, c, q).unwrap();
        }
    }

    #[test]
    fn test_process_file_writes_annotated_csv() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("VAH01.csv");
        let output = temp_dir.path().join("out").join("VAH01_cleaned.csv");
        write_log(&input, &[0, 0, 1, 2, 3, 1, 2, 4, 5]);

        let report = process_file(&input, &output, &PipelineConfig::default()).unwrap();
        assert_eq!(report.rows, 9);

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "time_s,cycleNumber,Ecell_V,QDischarge_mA_h,is_test_cycle,discharge_peak_value"
        );
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_process_file_schema_error_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("bad.csv");
        let output = temp_dir.path().join("bad_out.csv");
        fs::write(&input, "time_s,Ecell_V\n0,3.7\n").unwrap();

        let err = process_file(&input, &output, &PipelineConfig::default()).unwrap_err();
        assert!(err.is_schema_error());
        assert!(!output.exists());
    }

    #[test]
    fn test_process_file_empty_input() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("empty.csv");
        let output = temp_dir.path().join("empty_out.csv");
        fs::write(&input, "time_s,cycleNumber,QDischarge_mA_h\n").unwrap();

        let err = process_file(&input, &output, &PipelineConfig::default()).unwrap_err();
        assert!(err.is_empty_input());
        assert!(!output.exists());
    }

    #[test]
    fn test_process_batch_isolates_failures() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("raw");
        let output_dir = temp_dir.path().join("clean");
        fs::create_dir_all(&input_dir).unwrap();

        write_log(&input_dir.join("VAH01.csv"), &[0, 1, 2, 3]);
        write_log(&input_dir.join("VAH02.csv"), &[5, 6, 2, 3, 9]);
        fs::write(input_dir.join("VAH03.csv"), "time_s\n1\n").unwrap();
        write_log(&input_dir.join("other.csv"), &[0, 1]);

        let seen = std::sync::atomic::AtomicUsize::new(0);
        let outcomes = process_batch(
            &input_dir,
            &output_dir,
            &PipelineConfig::default(),
            None,
            |_| {
                seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            },
        )
        .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(seen.into_inner(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_ok());
        assert!(outcomes[2].result.is_err());
        assert!(output_dir.join("VAH01_cleaned.csv").exists());
        assert!(output_dir.join("VAH02_cleaned.csv").exists());
        assert!(!output_dir.join("VAH03_cleaned.csv").exists());
    }

    #[test]
    fn test_process_batch_limit() {
        let temp_dir = TempDir::new().unwrap();
        write_log(&temp_dir.path().join("VAH01.csv"), &[0, 1]);
        write_log(&temp_dir.path().join("VAH02.csv"), &[0, 1]);

        let outcomes = process_batch(
            temp_dir.path(),
            &temp_dir.path().join("out"),
            &PipelineConfig::default(),
            Some(1),
            |_| {},
        )
        .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].input.file_name().unwrap(), "VAH01.csv");
    }
}
