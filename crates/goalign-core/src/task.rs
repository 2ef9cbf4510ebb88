//! Package verdicts, optimization tasks and run results.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TaskFailure;

/// Whether a directory may be handed to the rewriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eligibility {
    /// Contains Go sources and none of them import `reflect`.
    Eligible,
    /// Contains no Go source files.
    NoSources,
    /// At least one source file imports `reflect`.
    ImportsReflect {
        /// First file found importing it.
        file: PathBuf,
    },
}

impl Eligibility {
    /// Check if the rewriter may run on this directory.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// A directory that was classified during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDir {
    /// Directory path.
    pub path: PathBuf,
    /// Go source files directly inside the directory, sorted by name.
    pub sources: Vec<PathBuf>,
    /// Classification result.
    pub eligibility: Eligibility,
}

impl PackageDir {
    /// Check if the rewriter may run on this directory.
    pub fn is_eligible(&self) -> bool {
        self.eligibility.is_eligible()
    }
}

/// Options forwarded to every rewriter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteOptions {
    /// Rewrite generated files too.
    pub generated_files: bool,
    /// Rewrite `_test.go` files too.
    pub test_files: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            generated_files: true,
            test_files: true,
        }
    }
}

/// A unit of rewrite work bound to one eligible package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeTask {
    /// Package directory to rewrite.
    pub dir: PathBuf,
    /// Rewriter options.
    pub options: RewriteOptions,
}

impl OptimizeTask {
    /// Create a new task.
    pub fn new(dir: impl Into<PathBuf>, options: RewriteOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }
}

/// Counters reported by the tree scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Directories classified.
    pub dirs_visited: u64,
    /// Hidden directories pruned along with their subtrees.
    pub hidden_skipped: u64,
    /// Directories classified as eligible.
    pub eligible: u64,
    /// Directories without Go sources.
    pub without_sources: u64,
    /// Directories skipped because they import `reflect`.
    pub reflect_skipped: u64,
    /// Tasks sent to the pool.
    pub tasks_dispatched: u64,
}

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Every pass exited successfully.
    Succeeded {
        /// Passes that ran.
        passes: usize,
    },
    /// A pass failed; later passes did not run.
    Failed(TaskFailure),
    /// Never dispatched because the run was already failing.
    Skipped,
}

/// Outcome of one task in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Package directory of the task.
    pub dir: PathBuf,
    /// Final state.
    pub status: TaskStatus,
    /// Wall time spent on the task.
    pub elapsed: Duration,
}

impl TaskOutcome {
    /// Check if the task succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded { .. })
    }

    /// Get the failure, if the task failed.
    pub fn failure(&self) -> Option<&TaskFailure> {
        match &self.status {
            TaskStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Aggregate outcome of all tasks in one pool run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// One outcome per task received: skipped tasks first, then dispatched
    /// tasks in dispatch order.
    pub outcomes: Vec<TaskOutcome>,
    /// First failure observed in time.
    pub first_failure: Option<TaskFailure>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl RunResult {
    /// Check if every task succeeded.
    pub fn is_success(&self) -> bool {
        self.first_failure.is_none() && self.outcomes.iter().all(TaskOutcome::is_success)
    }

    /// Number of tasks that succeeded.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of tasks that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failure().is_some()).count()
    }

    /// Number of tasks that were never dispatched.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == TaskStatus::Skipped)
            .count()
    }

    /// Look up the outcome for a directory.
    pub fn outcome_for(&self, dir: &Path) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.dir == dir)
    }

    /// Directories whose rewrite succeeded, sorted.
    pub fn optimized_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.dir.clone())
            .collect();
        dirs.sort();
        dirs
    }
}
