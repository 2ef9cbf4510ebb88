//! Reports returned by the pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use goalign_core::{RunResult, ScanSummary};
use goalign_ops::CopyStats;

use crate::reconcile::Reconciliation;

/// Result of a full staged build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Directory goalign was invoked from; the executable lands here.
    pub invocation_dir: PathBuf,
    /// Directory containing `go.mod`.
    pub module_root: PathBuf,
    /// Staging tree the build ran in.
    pub staging_dir: PathBuf,
    /// The staging tree was left on disk.
    pub staging_kept: bool,
    /// Removal of the staging tree failed with this message.
    pub staging_cleanup_error: Option<String>,
    /// What was copied into the staging tree.
    pub copy: CopyStats,
    /// Scanner counters.
    pub scan: ScanSummary,
    /// Per-package rewrite outcomes.
    pub rewrite: RunResult,
    /// Output of `go test ./...` when tests were run.
    pub tests_output: Option<String>,
    /// Executable reconciliation.
    pub artifact: Reconciliation,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl BuildReport {
    /// Path of the copied executable, if any.
    pub fn artifact_path(&self) -> Option<&Path> {
        match &self.artifact {
            Reconciliation::Copied { destination, .. } => Some(destination),
            Reconciliation::NoExecutable => None,
        }
    }

    /// Size in bytes of the copied executable, if any.
    pub fn artifact_size(&self) -> Option<u64> {
        match self.artifact {
            Reconciliation::Copied { size, .. } => Some(size),
            Reconciliation::NoExecutable => None,
        }
    }
}

/// Result of staging a module and listing what would be rewritten.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub invocation_dir: PathBuf,
    pub module_root: PathBuf,
    pub staging_dir: PathBuf,
    pub staging_kept: bool,
    pub staging_cleanup_error: Option<String>,
    pub copy: CopyStats,
    pub scan: ScanSummary,
    /// Eligible package directories relative to the module root, sorted.
    pub packages: Vec<PathBuf>,
    pub elapsed: Duration,
}
