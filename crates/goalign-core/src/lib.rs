//! Core types and configuration for goalign.
//!
//! This crate provides the data structures shared by the scanner, the
//! rewrite pool and the build pipeline: package verdicts, optimization
//! tasks, run results, configuration and error types.

mod config;
mod error;
mod task;

pub use config::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PASSES, PipelineConfig, PipelineConfigBuilder};
pub use error::{CommandError, ScanError, TaskFailure};
pub use task::{
    Eligibility, OptimizeTask, PackageDir, RewriteOptions, RunResult, ScanSummary, TaskOutcome,
    TaskStatus,
};

/// File extension of Go source files.
pub const SOURCE_EXTENSION: &str = "go";

/// Import path of the reflection package. Packages importing it are never rewritten.
pub const REFLECT_IMPORT: &str = "reflect";
