//! Directory listings taken before and after a build.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

/// Kind of a directory entry, without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(file_type: fs::FileType) -> Self {
        if file_type.is_dir() {
            Self::Dir
        } else if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// One entry of a [`DirSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// File name within the directory.
    pub name: OsString,
    /// Entry kind.
    pub kind: EntryKind,
    /// Permission bits of the entry, following symlinks.
    pub mode: u32,
}

impl SnapshotEntry {
    /// Check if any execute bit is set on a non-directory entry.
    pub fn is_executable(&self) -> bool {
        self.kind != EntryKind::Dir && self.mode & 0o111 != 0
    }
}

/// Entries directly inside one directory, ordered by name.
#[derive(Debug, Clone)]
pub struct DirSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl DirSnapshot {
    /// List `dir`.
    pub fn capture(dir: &Path) -> io::Result<Self> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let kind = EntryKind::from(entry.file_type()?);
            let path = entry.path();
            // A dangling link has no target to inspect.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(_) => fs::symlink_metadata(&path)?,
            };
            entries.push(SnapshotEntry {
                name: entry.file_name(),
                kind,
                mode: mode_of(&metadata),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { entries })
    }

    /// All entries, ordered by name.
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// Non-directory entries present here but not in `before`.
    pub fn new_entries<'a>(&'a self, before: &DirSnapshot) -> Vec<&'a SnapshotEntry> {
        let known: HashSet<&OsString> = before.entries.iter().map(|e| &e.name).collect();
        self.entries
            .iter()
            .filter(|entry| entry.kind != EntryKind::Dir && !known.contains(&entry.name))
            .collect()
    }
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_metadata: &fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_sorted_by_name() {
        let temp = TempDir::new().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::write(temp.path().join(name), "").unwrap();
        }

        let snapshot = DirSnapshot::capture(temp.path()).unwrap();
        let names: Vec<_> = snapshot.entries().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_new_entries_ignore_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("main.go"), "package main\n").unwrap();
        let before = DirSnapshot::capture(temp.path()).unwrap();

        fs::write(temp.path().join("app"), "binary").unwrap();
        fs::create_dir(temp.path().join("out")).unwrap();
        // Existing entries stay old even when modified.
        fs::write(temp.path().join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
        let after = DirSnapshot::capture(temp.path()).unwrap();

        let new: Vec<_> = after.new_entries(&before).iter().map(|e| e.name.clone()).collect();
        assert_eq!(new, vec!["app"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tool");
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let plain = DirSnapshot::capture(temp.path()).unwrap();
        assert!(!plain.entries()[0].is_executable());

        // Group execute alone is enough.
        fs::set_permissions(&path, fs::Permissions::from_mode(0o614)).unwrap();
        let exec = DirSnapshot::capture(temp.path()).unwrap();
        assert!(exec.entries()[0].is_executable());
        assert_eq!(exec.entries()[0].kind, EntryKind::File);
    }
}
