//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{load_cycler_csv, AnnotatedTable, CycleTable, LoaderError};
pub use writers::{write_annotated_csv, write_records_csv, WriteError};
