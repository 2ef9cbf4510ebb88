//! Error types shared across goalign crates.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while scanning a tree for packages.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be walked.
    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// The import clause of a source file could not be parsed.
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Path the error is attributed to.
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::Walk { path, .. }
            | Self::Parse { path, .. }
            | Self::NotADirectory { path } => path,
        }
    }

    /// Re-root the attributed path from `from` onto `to`.
    ///
    /// Paths outside `from` are left alone.
    pub fn rebase(mut self, from: &Path, to: &Path) -> Self {
        let path = match &mut self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::Walk { path, .. }
            | Self::Parse { path, .. }
            | Self::NotADirectory { path } => path,
        };
        if let Ok(relative) = path.strip_prefix(from) {
            *path = to.join(relative);
        }
        self
    }
}

/// Errors from running an external program.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{command} failed ({status}):\n{output}")]
    Failed {
        command: String,
        status: ExitStatus,
        output: String,
    },
}

impl CommandError {
    /// Captured combined output, empty when the program never started.
    pub fn output(&self) -> &str {
        match self {
            Self::Spawn { .. } => "",
            Self::Failed { output, .. } => output,
        }
    }
}

/// A rewrite task that did not complete.
///
/// Owned strings only, so the failure can be cloned into both the task
/// outcome and the run-wide first-failure slot.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("rewrite of {} failed on pass {pass}: {message}", .dir.display())]
pub struct TaskFailure {
    /// Package directory the task was bound to.
    pub dir: PathBuf,
    /// 1-based pass that failed (0 when the worker never ran).
    pub pass: usize,
    /// Human-readable reason.
    pub message: String,
    /// Combined stdout/stderr of the failing invocation.
    pub output: String,
}

impl TaskFailure {
    /// Create a failure from a command error on the given pass.
    pub fn from_command(dir: impl Into<PathBuf>, pass: usize, err: &CommandError) -> Self {
        let message = match err {
            CommandError::Spawn { program, source } => format!("could not run {program}: {source}"),
            CommandError::Failed { status, .. } => format!("rewriter exited with {status}"),
        };
        Self {
            dir: dir.into(),
            pass,
            message,
            output: err.output().to_string(),
        }
    }

    /// Create a failure for a worker that died without reporting.
    pub fn worker_lost(dir: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pass: 0,
            message: reason.into(),
            output: String::new(),
        }
    }
}
