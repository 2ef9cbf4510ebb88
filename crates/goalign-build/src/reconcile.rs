//! Locating the executable produced by a build.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;

use goalign_ops::copy_file_with_mode;

use crate::error::BuildError;
use crate::snapshot::{DirSnapshot, SnapshotEntry};

/// Mode forced on the copied executable.
pub const ARTIFACT_MODE: u32 = 0o755;

/// What the reconciler did after the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reconciliation {
    /// The build created no new executable; nothing was copied.
    NoExecutable,
    /// The single new executable was copied out.
    Copied {
        source: PathBuf,
        destination: PathBuf,
        size: u64,
    },
}

/// Diffs a build directory around a build and copies out the new executable.
#[derive(Debug, Clone)]
pub struct ArtifactReconciler {
    dir: PathBuf,
}

impl ArtifactReconciler {
    /// Watch `dir`, the directory the build runs in.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Run `build` between two snapshots and copy the single new executable
    /// into `destination_dir`.
    ///
    /// A build error is returned unchanged. Zero new executables is not an
    /// error. Two or more is, and nothing is copied.
    pub async fn reconcile<F>(
        &self,
        build: F,
        destination_dir: &Path,
    ) -> Result<Reconciliation, BuildError>
    where
        F: Future<Output = Result<(), BuildError>>,
    {
        let before = self.snapshot().await?;
        build.await?;
        let after = self.snapshot().await?;

        let new_entries = after.new_entries(&before);
        tracing::debug!(dir = %self.dir.display(), new = new_entries.len(), "build finished");

        let Some(artifact) = select_artifact(&self.dir, &new_entries)? else {
            tracing::info!(dir = %self.dir.display(), "go build produced no new executable");
            return Ok(Reconciliation::NoExecutable);
        };

        let source = self.dir.join(&artifact.name);
        let destination = destination_dir.join(&artifact.name);
        let size = {
            let (from, to) = (source.clone(), destination.clone());
            tokio::task::spawn_blocking(move || copy_file_with_mode(&from, &to, ARTIFACT_MODE))
                .await?
                .map_err(|source_err| BuildError::ArtifactCopy {
                    from: source.clone(),
                    to: destination.clone(),
                    source: source_err,
                })?
        };

        tracing::info!(
            artifact = %destination.display(),
            size,
            "copied executable"
        );
        Ok(Reconciliation::Copied {
            source,
            destination,
            size,
        })
    }

    async fn snapshot(&self) -> Result<DirSnapshot, BuildError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || DirSnapshot::capture(&dir))
            .await?
            .map_err(|source| BuildError::Snapshot {
                path: self.dir.clone(),
                source,
            })
    }
}

/// Pick the single executable among new entries.
///
/// Returns `None` when there is no executable and an error when there is
/// more than one.
pub fn select_artifact<'a>(
    dir: &Path,
    new_entries: &[&'a SnapshotEntry],
) -> Result<Option<&'a SnapshotEntry>, BuildError> {
    let executables: Vec<&SnapshotEntry> = new_entries
        .iter()
        .copied()
        .filter(|entry| entry.is_executable())
        .collect();

    match executables.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(*single)),
        many => Err(BuildError::AmbiguousArtifact {
            dir: dir.to_path_buf(),
            names: many
                .iter()
                .map(|entry| entry.name.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}
