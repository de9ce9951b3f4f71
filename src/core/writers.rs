//! Data writers for processed cycler logs and derived tables.
//!
//! Outputs are first written to a `.partial` sibling and renamed into
//! place once complete, so a failed run never leaves a truncated file at
//! the destination path.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::loaders::AnnotatedTable;

/// Name of the test-cycle flag column added on export.
pub const IS_TEST_CYCLE_COLUMN: &str = "is_test_cycle";

/// Name of the interpolated peak column added on export.
pub const PEAK_VALUE_COLUMN: &str = "discharge_peak_value";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched column lengths.
    #[error("column length mismatch: table has {rows} rows, {column} has {len} values")]
    LengthMismatch {
        rows: usize,
        column: &'static str,
        len: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

type CsvFileWriter = csv::Writer<BufWriter<File>>;

/// Write a CSV through the `.partial` sibling of `path`.
///
/// `body` receives the writer and the partial path for error context. The
/// partial file is renamed into place only if `body` and the final flush
/// succeed; on any failure it is removed.
fn write_via_partial<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut CsvFileWriter, &str) -> Result<()>,
{
    ensure_parent_dirs(path)?;
    let partial = partial_path(path);
    let file = File::create(&partial).map_err(|e| WriteError::CreateFile {
        path: partial.display().to_string(),
        source: e,
    })?;
    let mut writer = csv::Writer::from_writer(BufWriter::with_capacity(64 * 1024, file));

    let result = body(&mut writer, &partial.display().to_string())
        .and_then(|()| commit(writer, &partial, path));
    if result.is_err() {
        fs::remove_file(&partial).ok();
    }
    result
}

/// Flush the writer and move the partial file into place.
fn commit(mut writer: CsvFileWriter, partial: &Path, path: &Path) -> Result<()> {
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: partial.display().to_string(),
        source: e,
    })?;
    drop(writer);

    fs::rename(partial, path).map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })
}

fn format_flag(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

fn format_peak(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

/// Write an annotated cycler log to CSV.
///
/// All original columns are written unchanged except the cycle column,
/// which carries the corrected numbering. `is_test_cycle` and
/// `discharge_peak_value` are appended, or overwritten in place if the
/// input already had them. Flags are written as `True`/`False`; an
/// undefined peak value is an empty cell.
///
/// # Errors
///
/// Returns an error if:
/// - A derived column does not have one value per row
/// - Parent directories cannot be created
/// - The file cannot be created, written or renamed into place
pub fn write_annotated_csv(path: &Path, annotated: &AnnotatedTable) -> Result<()> {
    let rows = annotated.len();
    if annotated.is_test_cycle.len() != rows {
        return Err(WriteError::LengthMismatch {
            rows,
            column: IS_TEST_CYCLE_COLUMN,
            len: annotated.is_test_cycle.len(),
        });
    }
    if annotated.discharge_peak_value.len() != rows {
        return Err(WriteError::LengthMismatch {
            rows,
            column: PEAK_VALUE_COLUMN,
            len: annotated.discharge_peak_value.len(),
        });
    }

    let table = &annotated.table;

    let mut headers = table.headers.clone();
    let flag_idx = table.column_index(IS_TEST_CYCLE_COLUMN).unwrap_or_else(|| {
        headers.push(IS_TEST_CYCLE_COLUMN.to_string());
        headers.len() - 1
    });
    let peak_idx = table.column_index(PEAK_VALUE_COLUMN).unwrap_or_else(|| {
        headers.push(PEAK_VALUE_COLUMN.to_string());
        headers.len() - 1
    });

    write_via_partial(path, |writer, path_str| {
        writer.write_record(&headers).map_err(|e| WriteError::CsvError {
            path: path_str.to_string(),
            source: e,
        })?;

        let width = headers.len();
        let mut fields: Vec<String> = Vec::with_capacity(width);
        for (i, record) in table.records.iter().enumerate() {
            fields.clear();
            fields.extend(record.iter().map(str::to_string));
            fields.resize(width, String::new());
            fields[flag_idx] = format_flag(annotated.is_test_cycle[i]).to_string();
            fields[peak_idx] = format_peak(annotated.discharge_peak_value[i]);

            writer.write_record(&fields).map_err(|e| WriteError::CsvError {
                path: path_str.to_string(),
                source: e,
            })?;
        }
        Ok(())
    })
}

/// Write serializable rows to CSV with a header derived from the type.
///
/// # Example
///
/// ```no_run
/// use cycler_pipeline::core::writers::write_records_csv;
/// use serde::Serialize;
/// use std::path::Path;
///
/// #[derive(Serialize)]
/// struct Row { cycle: i64, capacity: f64 }
///
/// let rows = vec![Row { cycle: 1, capacity: 2950.0 }];
/// write_records_csv(Path::new("rows.csv"), &rows).unwrap();
/// ```
pub fn write_records_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_via_partial(path, |writer, path_str| {
        for row in rows {
            writer.serialize(row).map_err(|e| WriteError::CsvError {
                path: path_str.to_string(),
                source: e,
            })?;
        }
        Ok(())
    })
}
