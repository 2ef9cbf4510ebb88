//! Operations engine for goalign.
//!
//! This crate runs the external field-alignment rewriter over package
//! directories with bounded parallelism, and copies source trees into
//! isolated staging areas.

mod command;
mod copy;
mod pool;
mod rewrite;

pub use command::{CommandOutput, describe_command, run_captured, run_checked};
pub use copy::{CopyError, CopyStats, copy_file_with_mode, copy_tree};
pub use pool::WorkerPool;
pub use rewrite::{REWRITER_NAME, Rewriter};

/// Default channel buffer size between the scanner and the worker pool.
pub const TASK_CHANNEL_SIZE: usize = 64;
