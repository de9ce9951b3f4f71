//! Discovery of cycler log files in a directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;

/// Compile a file name pattern from the batch config.
pub fn file_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid file pattern: {}", pattern))
}

/// Find files in `dir` whose file name matches `pattern`.
///
/// Only regular files directly inside `dir` are considered. Results are
/// sorted by path so batch order is stable.
pub fn find_cycler_files(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| pattern.is_match(name))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Battery identifier for a log file: its file stem (`VAH01.csv` -> `VAH01`).
pub fn battery_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Output path for a processed log: `<output_dir>/<stem><suffix>.csv`.
pub fn output_path_for(input: &Path, output_dir: &Path, suffix: &str) -> PathBuf {
    output_dir.join(format!("{}{}.csv", battery_id(input), suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_find_cycler_files() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["VAH02.csv", "VAH01.csv", "VAH01.txt", "notes.csv", "VAH1x.csv"] {
            File::create(temp_dir.path().join(name)).unwrap();
        }
        fs::create_dir(temp_dir.path().join("VAH03.csv")).unwrap();

        let pattern = file_pattern(r"^VAH\d+\.csv$").unwrap();
        let files = find_cycler_files(temp_dir.path(), &pattern).unwrap();
        let names: Vec<String> = files.iter().map(|p| battery_id(p)).collect();

        assert_eq!(names, vec!["VAH01", "VAH02"]);
    }

    #[test]
    fn test_missing_directory() {
        let pattern = file_pattern(".*").unwrap();
        assert!(find_cycler_files(Path::new("/nonexistent/dir"), &pattern).is_err());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(file_pattern("(unclosed").is_err());
    }

    #[test]
    fn test_output_path_for() {
        let out = output_path_for(Path::new("data/VAH17.csv"), Path::new("out"), "_cleaned");
        assert_eq!(out, PathBuf::from("out/VAH17_cleaned.csv"));
    }
}
