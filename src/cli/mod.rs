//! Command-line interface for the cycler pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PeakConfig;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "cycler-pipeline")]
#[command(about = "Battery cycler log repair pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair the cycle numbering of one log and add peak capacity estimates
    Process {
        /// Raw cycler CSV
        input: PathBuf,
        /// Output CSV
        output: PathBuf,
        /// Minimum discharge capacity for a peak
        #[arg(long)]
        min_height: Option<f64>,
        /// Minimum spacing between peaks, in test-row samples
        #[arg(long)]
        min_distance: Option<usize>,
    },

    /// Process every matching log in a directory
    Batch {
        /// Directory containing raw cycler CSVs
        input_dir: PathBuf,
        /// Output directory for cleaned CSVs
        output_dir: PathBuf,
        /// Limit number of files to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Aggregate a processed log into per-cycle features
    Aggregate {
        /// Processed cycler CSV
        input: PathBuf,
        /// Output features CSV
        output: PathBuf,
        /// Battery identifier (defaults to the input file stem)
        #[arg(long)]
        battery_id: Option<String>,
    },

    /// Score predictions against true values (R², RMSE, relative RMSE)
    Score {
        /// CSV with truth and prediction columns
        csv: PathBuf,
        /// Name of the true value column
        #[arg(long, default_value = "discharge_capacity")]
        truth: String,
        /// Name of the prediction column
        #[arg(long, default_value = "prediction")]
        pred: String,
    },

    /// Run the pipeline on one log and plot the result (PNG)
    Plot {
        /// Raw cycler CSV
        input: PathBuf,
        /// Output PNG file path (defaults to same name as input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum number of rows to plot (subsamples if exceeded)
        #[arg(long, default_value_t = 200_000)]
        max_points: usize,
    },

    /// Write the default configuration to a YAML file
    InitConfig {
        /// Destination YAML path
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar for a known number of files
fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Process { input, output, min_height, min_distance } => {
            cmd_process(&input, &output, min_height, min_distance, &config);
        }
        Commands::Batch { input_dir, output_dir, limit } => {
            cmd_batch(&input_dir, &output_dir, limit, &config);
        }
        Commands::Aggregate { input, output, battery_id } => {
            cmd_aggregate(&input, &output, battery_id, &config);
        }
        Commands::Score { csv, truth, pred } => {
            cmd_score(&csv, &truth, &pred);
        }
        Commands::Plot { input, output, max_points } => {
            cmd_plot(&input, output, max_points, &config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path);
        }
    }
}

/// Apply command-line peak overrides on top of the loaded config.
fn peak_overrides(config: &PipelineConfig, min_height: Option<f64>, min_distance: Option<usize>) -> PipelineConfig {
    PipelineConfig {
        peaks: PeakConfig {
            min_height: min_height.unwrap_or(config.peaks.min_height),
            min_distance: min_distance.unwrap_or(config.peaks.min_distance),
            fallback_value: config.peaks.fallback_value,
        },
        ..config.clone()
    }
}

fn format_cycles(cycles: &[i64]) -> String {
    cycles
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn cmd_process(
    input: &Path,
    output: &Path,
    min_height: Option<f64>,
    min_distance: Option<usize>,
    config: &PipelineConfig,
) {
    use crate::processors::pipeline;

    let start = Instant::now();
    let effective = peak_overrides(config, min_height, min_distance);

    println!("Processing cycler log...");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());

    let spinner = create_spinner("Repairing cycle numbers...");

    match pipeline::process_file(input, output, &effective) {
        Ok(report) => {
            spinner.finish_and_clear();

            print_summary(
                "Processing Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output file", output.display().to_string()),
                    ("Rows", report.rows.to_string()),
                    ("Test cycles", format_cycles(&report.test_cycles)),
                    ("Test rows", report.test_rows.to_string()),
                    ("Corrections", report.corrections.to_string()),
                    ("Total offset", report.offset.to_string()),
                    ("Peaks found", report.peaks_found().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Processing failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_batch(input_dir: &Path, output_dir: &Path, limit: Option<usize>, config: &PipelineConfig) {
    use crate::processors::{discovery, pipeline};

    let start = Instant::now();

    println!("Processing cycler logs in batch mode...");
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_dir.display());

    if let Some(lim) = limit {
        println!("Processing limit: {} files", lim);
    }

    // Count up front so the bar has a length
    let total = discovery::file_pattern(&config.batch.file_pattern)
        .and_then(|pattern| discovery::find_cycler_files(input_dir, &pattern))
        .map(|files| limit.map_or(files.len(), |l| files.len().min(l)))
        .unwrap_or(0);

    let pb = create_progress_bar(total as u64);
    let outcomes = pipeline::process_batch(input_dir, output_dir, config, limit, |outcome| {
        pb.set_message(discovery::battery_id(&outcome.input));
        pb.inc(1);
    });
    pb.finish_and_clear();

    let outcomes = match outcomes {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!("Batch processing failed: {:#}", e);
            std::process::exit(1);
        }
    };

    let failed: Vec<String> = outcomes
        .iter()
        .filter(|o| o.result.is_err())
        .map(|o| discovery::battery_id(&o.input))
        .collect();
    let rows: usize = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|r| r.rows)
        .sum();

    print_summary(
        "Batch Processing Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Files", outcomes.len().to_string()),
            ("Succeeded", (outcomes.len() - failed.len()).to_string()),
            ("Failed", failed.len().to_string()),
            ("Rows processed", rows.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if !failed.is_empty() {
        error!("Failed files: {}", failed.join(", "));
        std::process::exit(1);
    }
}

fn cmd_aggregate(input: &Path, output: &Path, battery_id: Option<String>, config: &PipelineConfig) {
    use crate::core::{loaders, writers};
    use crate::processors::{discovery, features};

    let start = Instant::now();
    let battery_id = battery_id.unwrap_or_else(|| discovery::battery_id(input));

    println!("Aggregating per-cycle features...");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());

    let spinner = create_spinner("Loading cycler log...");

    let table = match loaders::load_cycler_csv(input, &config.columns) {
        Ok(t) => t,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Summarising cycles...");

    let rows = match features::aggregate_cycles(&table, &battery_id, &config.features) {
        Ok(rows) => rows,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Aggregation failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = writers::write_records_csv(output, &rows) {
        spinner.finish_and_clear();
        error!("Failed to write features: {}", e);
        std::process::exit(1);
    }

    spinner.finish_and_clear();

    print_summary(
        "Aggregation Complete",
        &[
            ("Battery", battery_id),
            ("Input rows", table.len().to_string()),
            ("Cycles", rows.len().to_string()),
            ("Output file", output.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_score(csv: &Path, truth: &str, pred: &str) {
    use crate::core::loaders;
    use crate::processors::scoring;

    let columns = match loaders::load_numeric_columns(csv, &[truth, pred]) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load {}: {}", csv.display(), e);
            std::process::exit(1);
        }
    };

    // Only rows where both values are present are scored
    let (y_true, y_pred): (Vec<f64>, Vec<f64>) = columns[0]
        .iter()
        .zip(columns[1].iter())
        .filter(|(t, p)| t.is_finite() && p.is_finite())
        .map(|(&t, &p)| (t, p))
        .unzip();

    let skipped = columns[0].len() - y_true.len();
    if skipped > 0 {
        warn!("Skipped {} rows with missing {} or {}", skipped, truth, pred);
    }

    let scores = scoring::r2_score(&y_true, &y_pred).and_then(|r2| {
        Ok((
            r2,
            scoring::rmse(&y_true, &y_pred)?,
            scoring::relative_rmse(&y_true, &y_pred)?,
        ))
    });

    match scores {
        Ok((r2, rmse, relative)) => {
            print_summary(
                "Scores",
                &[
                    ("File", csv.display().to_string()),
                    ("Samples", y_true.len().to_string()),
                    ("R2", format!("{:.6}", r2)),
                    ("RMSE", format!("{:.6}", rmse)),
                    ("Relative RMSE", format!("{:.6}", relative)),
                ],
            );
        }
        Err(e) => {
            error!("Scoring failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_plot(input: &Path, output: Option<PathBuf>, max_points: usize, config: &PipelineConfig) {
    use crate::processors::pipeline;
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| input.with_extension("png"));

    println!("Plotting cycler log...");
    println!("Input: {}", input.display());
    println!("Output: {}", output_path.display());
    println!("Max points: {}", max_points);

    let spinner = create_spinner("Running pipeline...");

    let (annotated, report) = match pipeline::process_in_memory(input, &config.columns, &config.peaks) {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Processing failed: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Generating plot...");

    match visualization::plot_cycle_series(&output_path, &annotated, &report.peaks, max_points) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Visualization Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Rows", report.rows.to_string()),
                    ("Peaks", report.peaks_found().to_string()),
                    ("Max points plotted", max_points.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Visualization failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(path: &Path) {
    match PipelineConfig::default().to_yaml(path) {
        Ok(()) => println!("Wrote default config to {}", path.display()),
        Err(e) => {
            error!("Failed to write config: {}", e);
            std::process::exit(1);
        }
    }
}
