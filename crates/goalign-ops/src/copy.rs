//! Recursive tree copy into a staging area.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jwalk::WalkDir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use goalign_scan::pruning_hidden_dirs;

/// Mode for directories created in the copy.
#[cfg(unix)]
const DIR_MODE: u32 = 0o750;

/// Errors from copying a source tree.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Source root is missing or not a directory.
    #[error("Copy source is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A directory could not be walked.
    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// An entry could not be copied.
    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Counters for one tree copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStats {
    /// Directories created.
    pub dirs: u64,
    /// Regular files copied.
    pub files: u64,
    /// Symlinks recreated.
    pub symlinks: u64,
    /// Bytes of regular file content copied.
    pub bytes: u64,
    /// Hidden directories left out with their subtrees.
    pub hidden_skipped: u64,
}

/// Copy the tree under `src` into `dst`, leaving out hidden directories.
///
/// `dst` is created if needed. Files keep their permission bits and
/// symlinks are recreated as links. The first error aborts the copy.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats, CopyError> {
    if !src.is_dir() {
        return Err(CopyError::NotADirectory {
            path: src.to_path_buf(),
        });
    }
    create_dir(dst).map_err(|source| CopyError::Io {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    })?;

    let hidden_skipped = Arc::new(AtomicU64::new(0));
    let walker = WalkDir::new(src)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(1)
        .process_read_dir(pruning_hidden_dirs(Arc::clone(&hidden_skipped)));

    let mut stats = CopyStats::default();

    for entry_result in walker {
        let entry = entry_result.map_err(|err| CopyError::Walk {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| src.to_path_buf()),
            message: err.to_string(),
        })?;
        if let Some(err) = entry.read_children_error.as_ref() {
            return Err(CopyError::Walk {
                path: entry.path(),
                message: err.to_string(),
            });
        }

        let from = entry.path();
        let relative = from.strip_prefix(src).map_err(|_| CopyError::Walk {
            path: from.clone(),
            message: "entry escaped the copy root".to_string(),
        })?;
        let to = dst.join(relative);
        let file_type = entry.file_type();

        let copied = if file_type.is_dir() {
            create_dir(&to).map(|()| stats.dirs += 1)
        } else if file_type.is_symlink() {
            copy_symlink(&from, &to).map(|()| stats.symlinks += 1)
        } else if file_type.is_file() {
            fs::symlink_metadata(&from)
                .and_then(|meta| copy_file_with_mode(&from, &to, mode_of(&meta)))
                .map(|bytes| {
                    stats.files += 1;
                    stats.bytes += bytes;
                })
        } else {
            tracing::debug!(path = %from.display(), "skipping special file");
            Ok(())
        };

        copied.map_err(|source| CopyError::Io {
            from,
            to,
            source,
        })?;
    }

    stats.hidden_skipped = hidden_skipped.load(Ordering::Relaxed);
    tracing::debug!(
        src = %src.display(),
        dst = %dst.display(),
        files = stats.files,
        bytes = stats.bytes,
        "copied tree"
    );
    Ok(stats)
}

/// Copy one file's contents to `dst` and set its permission bits to `mode`.
///
/// Returns the number of bytes copied.
pub fn copy_file_with_mode(src: &Path, dst: &Path, mode: u32) -> io::Result<u64> {
    let bytes = fs::copy(src, dst)?;
    set_mode(dst, mode)?;
    Ok(bytes)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> u32 {
    0o644
}

#[cfg(unix)]
fn create_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::metadata(from)?;
    if meta.is_dir() {
        return Ok(());
    }
    fs::copy(from, to).map(|_| ())
}
