//! Data processing modules.

pub mod classifier;
pub mod discovery;
pub mod features;
pub mod merge;
pub mod peaks;
pub mod pipeline;
pub mod renumber;
pub mod scoring;
pub mod transitions;

// Re-export key types for convenience
pub use classifier::{classify, Partition};
pub use discovery::{battery_id, find_cycler_files, output_path_for};
pub use features::{aggregate_cycles, CycleFeatures};
pub use merge::merge_and_fill;
pub use peaks::{extract_peaks, find_peaks, propagate_peaks, PeakRecord};
pub use pipeline::{
    process_batch, process_file, process_in_memory, run_pipeline, BatchOutcome, PipelineError,
    PipelineReport,
};
pub use renumber::{renumber, Renumbering};
pub use scoring::{r2_score, relative_rmse, rmse, ScoreError};
pub use transitions::{detect_test_cycles, find_transitions, AnomalySet, Transitions};
