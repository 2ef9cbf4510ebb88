//! Package discovery for goalign.
//!
//! This crate walks a Go module and decides which directories the field
//! alignment rewriter may touch.
//!
//! # Overview
//!
//! - **Import parsing** reads only the package clause and import declarations
//! - **Eligibility** rejects directories without sources or importing `reflect`
//! - **Tree scanning** prunes hidden directories and streams one task per
//!   eligible package into a channel
//!
//! # Example
//!
//! ```rust,no_run
//! use goalign_scan::{RewriteOptions, TreeScanner};
//!
//! let scanner = TreeScanner::new(RewriteOptions::default());
//! let (tasks, summary) = scanner.plan("/path/to/module".as_ref()).unwrap();
//!
//! println!("{} packages to rewrite", tasks.len());
//! println!("{} skipped for reflect", summary.reflect_skipped);
//! ```

mod eligibility;
mod imports;
mod scanner;

pub use eligibility::{EligibilityFilter, is_source_file};
pub use imports::{ImportParseError, ImportSpec, parse_imports};
pub use scanner::{TreeScanner, WalkEntry, is_hidden_name, pruning_hidden_dirs, task_dirs};

// Re-export core types for convenience
pub use goalign_core::{
    Eligibility, OptimizeTask, PackageDir, RewriteOptions, ScanError, ScanSummary,
};
