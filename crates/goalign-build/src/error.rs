//! Pipeline error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use goalign_core::{CommandError, ScanError, TaskFailure};
use goalign_ops::CopyError;

/// Errors that abort a staged build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A required executable could not be found.
    #[error("{tool} not found")]
    ToolNotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    /// `go env GOMOD` could not be run.
    #[error("Failed to locate the module of {}", .dir.display())]
    ModuleLookup {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },

    /// The invocation directory is not inside a Go module.
    #[error("No go.mod found for {}", .dir.display())]
    NoModuleRoot { dir: PathBuf },

    /// The staging directory could not be created.
    #[error("Failed to create staging directory {}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The module could not be copied into the staging tree.
    #[error("Failed to stage module")]
    Copy(#[from] CopyError),

    /// `go mod tidy` or `go mod vendor` failed.
    #[error("go mod {step} failed")]
    DependencyResolution {
        step: &'static str,
        #[source]
        source: CommandError,
    },

    /// The staging tree could not be scanned.
    #[error("Failed to scan staged module")]
    Scan(#[from] ScanError),

    /// At least one package failed to rewrite.
    #[error("{failed} package(s) failed to rewrite")]
    Rewrite {
        failed: usize,
        #[source]
        first: TaskFailure,
    },

    /// `go test ./...` failed.
    #[error("go test failed")]
    Tests(#[source] CommandError),

    /// `go build` failed.
    #[error("go build failed")]
    Build(#[source] CommandError),

    /// The build directory could not be listed.
    #[error("Failed to list {}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The build produced more than one new executable.
    #[error("go build produced {} new executables: {}", .names.len(), .names.join(", "))]
    AmbiguousArtifact { dir: PathBuf, names: Vec<String> },

    /// The executable could not be copied out of the staging tree.
    #[error("Failed to copy {} to {}", .from.display(), .to.display())]
    ArtifactCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A background task panicked or was cancelled.
    #[error("Background task failed")]
    Join(#[from] tokio::task::JoinError),
}
