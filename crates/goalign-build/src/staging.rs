//! Throwaway staging trees.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::BuildError;

/// Directory under the staging base that holds every staging tree.
pub const STAGING_DIR_NAME: &str = "goalign";

/// A uniquely named directory that holds a copy of one module.
///
/// The directory is not removed on drop; call [`StagingArea::remove`].
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create `<base>/goalign/<uuid>`.
    pub fn create(base: &Path) -> Result<Self, BuildError> {
        let root = base.join(STAGING_DIR_NAME).join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&root).map_err(|source| BuildError::Staging {
            path: root.clone(),
            source,
        })?;
        tracing::debug!(path = %root.display(), "created staging directory");
        Ok(Self { root })
    }

    /// Root of the staging tree.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Staged counterpart of `path`, a directory inside `module_root`.
    ///
    /// Paths outside the module map to the staging root.
    pub fn staged_path(&self, module_root: &Path, path: &Path) -> PathBuf {
        match relative_to(module_root, path) {
            Some(relative) => self.root.join(relative),
            None => {
                tracing::warn!(
                    path = %path.display(),
                    module = %module_root.display(),
                    "directory is outside the module, building at the module root"
                );
                self.root.clone()
            }
        }
    }

    /// Delete the staging tree.
    pub fn remove(self) -> io::Result<()> {
        std::fs::remove_dir_all(&self.root)?;
        tracing::debug!(path = %self.root.display(), "removed staging directory");
        Ok(())
    }

    /// Give up ownership without deleting anything.
    pub fn keep(self) -> PathBuf {
        self.root
    }
}

fn relative_to(base: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Some(relative.to_path_buf());
    }
    // Retry with symlinks resolved, e.g. /tmp vs /private/tmp.
    let base = base.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&base).ok().map(Path::to_path_buf)
}
