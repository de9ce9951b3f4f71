//! Data loaders for battery cycler CSV logs.
//!
//! A cycler log is one row per sample with a header naming each channel.
//! The loader keeps every raw record for passthrough on export and parses
//! the three channels the pipeline depends on (time, cycle counter and
//! discharge capacity) into typed columns up front. Any other channel is
//! parsed lazily with [`CycleTable::channel`].

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use thiserror::Error;

use crate::config::ColumnConfig;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Column-oriented view of one cycler log, in acquisition order.
#[derive(Debug, Clone)]
pub struct CycleTable {
    /// Header names, in file order.
    pub headers: Vec<String>,
    /// Raw records, one per row.
    pub records: Vec<StringRecord>,
    /// Elapsed time in seconds for each row.
    pub time_s: Vec<f64>,
    /// Raw cycle counter for each row.
    pub cycle_number: Vec<i64>,
    /// Discharge capacity (mAh) for each row.
    pub q_discharge: Vec<f64>,
    /// Position of the cycle column within `headers`.
    pub cycle_column: usize,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl CycleTable {
    /// Build a table from in-memory columns, synthesising raw records.
    ///
    /// Mostly useful for tests and for callers that already hold parsed
    /// data; headers are the default column names.
    pub fn from_columns(time_s: Vec<f64>, cycle_number: Vec<i64>, q_discharge: Vec<f64>) -> Self {
        let columns = ColumnConfig::default();
        let headers = vec![columns.time, columns.cycle, columns.discharge];
        let records = time_s
            .iter()
            .zip(cycle_number.iter())
            .zip(q_discharge.iter())
            .map(|((t, c), q)| StringRecord::from(vec![t.to_string(), c.to_string(), q.to_string()]))
            .collect();

        Self {
            headers,
            records,
            time_s,
            cycle_number,
            q_discharge,
            cycle_column: 1,
            source_path: None,
        }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.cycle_number.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cycle_number.is_empty()
    }

    /// Position of a column by exact header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Parse any numeric channel by name.
    ///
    /// Empty or unparseable cells become NaN.
    pub fn channel(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))?;

        Ok(self
            .records
            .iter()
            .map(|record| parse_float(record.get(idx)).unwrap_or(f64::NAN))
            .collect())
    }

    /// Copy of this table with the cycle counter replaced.
    ///
    /// Both the typed column and the raw records are updated so that the
    /// result exports the new numbering.
    pub fn with_cycle_numbers(&self, cycle_number: Vec<i64>) -> Self {
        debug_assert_eq!(cycle_number.len(), self.len());

        let records = self
            .records
            .iter()
            .zip(cycle_number.iter())
            .map(|(record, cycle)| {
                record
                    .iter()
                    .enumerate()
                    .map(|(i, field)| {
                        if i == self.cycle_column {
                            cycle.to_string()
                        } else {
                            field.to_string()
                        }
                    })
                    .collect::<StringRecord>()
            })
            .collect();

        Self {
            headers: self.headers.clone(),
            records,
            time_s: self.time_s.clone(),
            cycle_number,
            q_discharge: self.q_discharge.clone(),
            cycle_column: self.cycle_column,
            source_path: self.source_path.clone(),
        }
    }
}

/// A cycler log after renumbering and peak annotation.
#[derive(Debug, Clone)]
pub struct AnnotatedTable {
    /// The log with its cycle counter replaced by the corrected numbering.
    pub table: CycleTable,
    /// Cycle counter as it was read from the file.
    pub raw_cycle_number: Vec<i64>,
    /// Whether each row belongs to a test (reference) cycle.
    pub is_test_cycle: Vec<bool>,
    /// Interpolated capacity peak for each row; `None` only when no peak
    /// was found and no fallback is configured.
    pub discharge_peak_value: Vec<Option<f64>>,
}

impl AnnotatedTable {
    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn parse_float(field: Option<&str>) -> Option<f64> {
    field.map(str::trim).filter(|s| !s.is_empty())?.parse().ok()
}

/// Parse a cycle counter cell, accepting integral floats such as `"12.0"`.
fn parse_cycle(field: Option<&str>) -> Option<i64> {
    let value = parse_float(field)?;
    if value.is_finite() && value.fract() == 0.0 {
        Some(value as i64)
    } else {
        None
    }
}

/// Load a cycler log from a CSV file.
///
/// # Arguments
///
/// * `path` - Path to the cycler CSV file
/// * `columns` - Names of the time, cycle and discharge columns
///
/// # Errors
///
/// * `MissingColumns` if a required header is absent
/// * `EmptyFile` if the file has no data rows
/// * `ParseError` if a required cell cannot be parsed
pub fn load_cycler_csv<P: AsRef<Path>>(path: P, columns: &ColumnConfig) -> Result<CycleTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::with_capacity(64 * 1024, file));

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let col_map: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let missing: Vec<&str> = [&columns.time, &columns.cycle, &columns.discharge]
        .into_iter()
        .filter(|name| !col_map.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns(missing.join(", ")));
    }

    let time_idx = col_map[columns.time.as_str()];
    let cycle_idx = col_map[columns.cycle.as_str()];
    let discharge_idx = col_map[columns.discharge.as_str()];

    let mut records = Vec::new();
    let mut time_s = Vec::new();
    let mut cycle_number = Vec::new();
    let mut q_discharge = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let time = parse_float(record.get(time_idx)).ok_or_else(|| {
            LoaderError::ParseError(format!("row {}: invalid {} value", row + 1, columns.time))
        })?;
        let cycle = parse_cycle(record.get(cycle_idx)).ok_or_else(|| {
            LoaderError::ParseError(format!("row {}: invalid {} value", row + 1, columns.cycle))
        })?;
        let discharge = parse_float(record.get(discharge_idx)).ok_or_else(|| {
            LoaderError::ParseError(format!(
                "row {}: invalid {} value",
                row + 1,
                columns.discharge
            ))
        })?;

        time_s.push(time);
        cycle_number.push(cycle);
        q_discharge.push(discharge);
        records.push(record);
    }

    if records.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(CycleTable {
        headers,
        records,
        time_s,
        cycle_number,
        q_discharge,
        cycle_column: cycle_idx,
        source_path: Some(path.to_path_buf()),
    })
}

/// Load named numeric columns from any CSV file.
///
/// Used for scoring prediction files. Unparseable cells become NaN.
pub fn load_numeric_columns<P: AsRef<Path>>(path: P, names: &[&str]) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let indices: Vec<usize> = names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim() == *name)
                .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))
        })
        .collect::<Result<_>>()?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for result in reader.records() {
        let record = result?;
        for (column, &idx) in columns.iter_mut().zip(indices.iter()) {
            column.push(parse_float(record.get(idx)).unwrap_or(f64::NAN));
        }
    }

    if columns.first().map_or(true, Vec::is_empty) {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_cycler_csv() -> Result<()> {
        let file = write_csv(&[
            "time_s,Ecell_V,cycleNumber,QDischarge_mA_h",
            "0.0,3.5,0,0.0",
            "1.5,3.6,1.0,10.5",
            "3.0,3.7,2,20.25",
        ]);

        let table = load_cycler_csv(file.path(), &ColumnConfig::default())?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.cycle_number, vec![0, 1, 2]);
        assert_eq!(table.time_s[1], 1.5);
        assert_eq!(table.q_discharge[2], 20.25);
        assert_eq!(table.cycle_column, 2);
        assert_eq!(table.channel("Ecell_V")?, vec![3.5, 3.6, 3.7]);

        Ok(())
    }

    #[test]
    fn test_missing_required_column() {
        let file = write_csv(&["time_s,cycleNumber", "0.0,1"]);

        let result = load_cycler_csv(file.path(), &ColumnConfig::default());
        match result {
            Err(LoaderError::MissingColumns(cols)) => assert_eq!(cols, "QDischarge_mA_h"),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_file() {
        let file = write_csv(&["time_s,cycleNumber,QDischarge_mA_h"]);

        let result = load_cycler_csv(file.path(), &ColumnConfig::default());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_fractional_cycle_is_rejected() {
        let file = write_csv(&["time_s,cycleNumber,QDischarge_mA_h", "0.0,1.5,0.0"]);

        let result = load_cycler_csv(file.path(), &ColumnConfig::default());
        assert!(matches!(result, Err(LoaderError::ParseError(_))));
    }

    #[test]
    fn test_custom_column_names() -> Result<()> {
        let file = write_csv(&["t,cycle,q", "0.0,4,1.0", "1.0,5,2.0"]);
        let columns = ColumnConfig {
            time: "t".to_string(),
            cycle: "cycle".to_string(),
            discharge: "q".to_string(),
        };

        let table = load_cycler_csv(file.path(), &columns)?;
        assert_eq!(table.cycle_number, vec![4, 5]);

        Ok(())
    }

    #[test]
    fn test_channel_with_blank_cells() -> Result<()> {
        let file = write_csv(&[
            "time_s,cycleNumber,QDischarge_mA_h,Temperature__C",
            "0.0,1,0.0,",
            "1.0,1,0.0,25.5",
        ]);

        let table = load_cycler_csv(file.path(), &ColumnConfig::default())?;
        let temps = table.channel("Temperature__C")?;
        assert!(temps[0].is_nan());
        assert_eq!(temps[1], 25.5);
        assert!(matches!(
            table.channel("I_mA"),
            Err(LoaderError::MissingColumns(_))
        ));

        Ok(())
    }

    #[test]
    fn test_with_cycle_numbers_rewrites_records() {
        let table = CycleTable::from_columns(vec![0.0, 1.0], vec![1, 1], vec![0.0, 0.0]);
        let renumbered = table.with_cycle_numbers(vec![7, 8]);

        assert_eq!(renumbered.cycle_number, vec![7, 8]);
        assert_eq!(renumbered.records[1].get(1), Some("8"));
        assert_eq!(table.cycle_number, vec![1, 1]);
    }

    #[test]
    fn test_load_numeric_columns() -> Result<()> {
        let file = write_csv(&["id,truth,pred", "a,1.0,1.5", "b,2.0,"]);

        let columns = load_numeric_columns(file.path(), &["truth", "pred"])?;
        assert_eq!(columns[0], vec![1.0, 2.0]);
        assert_eq!(columns[1][0], 1.5);
        assert!(columns[1][1].is_nan());

        Ok(())
    }
}
