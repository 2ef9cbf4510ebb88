//! Per-directory eligibility classification.

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use goalign_core::{Eligibility, PackageDir, REFLECT_IMPORT, SOURCE_EXTENSION, ScanError};

use crate::imports::parse_imports;

/// Decides whether the rewriter may run in a directory.
///
/// Only files directly inside the directory are read, and only their import
/// clauses are parsed. Verdicts are cached for the lifetime of the filter.
#[derive(Debug, Default)]
pub struct EligibilityFilter {
    cache: DashMap<PathBuf, Eligibility>,
}

impl EligibilityFilter {
    /// Create a filter with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a directory.
    pub fn classify(&self, dir: &Path) -> Result<Eligibility, ScanError> {
        if let Some(cached) = self.cache.get(dir) {
            return Ok(cached.clone());
        }
        Ok(self.inspect(dir)?.eligibility)
    }

    /// Classify a directory and return the full package description.
    ///
    /// This always reads the directory; the verdict is still cached.
    pub fn inspect(&self, dir: &Path) -> Result<PackageDir, ScanError> {
        let sources = source_files(dir)?;

        let mut eligibility = if sources.is_empty() {
            Eligibility::NoSources
        } else {
            Eligibility::Eligible
        };

        for file in &sources {
            if imports_reflect(file)? {
                tracing::debug!(file = %file.display(), "imports {REFLECT_IMPORT}");
                eligibility = Eligibility::ImportsReflect { file: file.clone() };
                break;
            }
        }

        self.cache.insert(dir.to_path_buf(), eligibility.clone());
        Ok(PackageDir {
            path: dir.to_path_buf(),
            sources,
            eligibility,
        })
    }

    /// Number of cached verdicts.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Check if a path names a Go source file.
pub fn is_source_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Go source files directly inside `dir`, sorted by name.
fn source_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))?;

    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::io(dir, e))?;
        let path = entry.path();
        if !is_source_file(&path) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| ScanError::io(&path, e))?;
        // Symlinked sources are followed, directories named `*.go` are not sources.
        let is_file = if file_type.is_symlink() {
            fs::metadata(&path)
                .map_err(|e| ScanError::io(&path, e))?
                .is_file()
        } else {
            file_type.is_file()
        };
        if is_file {
            sources.push(path);
        }
    }

    sources.sort();
    Ok(sources)
}

fn imports_reflect(file: &Path) -> Result<bool, ScanError> {
    let src = fs::read_to_string(file).map_err(|e| ScanError::io(file, e))?;
    let imports = parse_imports(&src).map_err(|e| ScanError::Parse {
        path: file.to_path_buf(),
        line: e.line,
        message: e.message,
    })?;
    Ok(imports.iter().any(|spec| spec.path == REFLECT_IMPORT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_dir_has_no_sources() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README.md"), "docs").unwrap();

        let filter = EligibilityFilter::new();
        assert_eq!(filter.classify(temp.path()).unwrap(), Eligibility::NoSources);
    }

    #[test]
    fn test_plain_package_is_eligible() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("a.go"),
            "package a\n\nimport (\n\t\"fmt\"\n\t\"strings\"\n)\n",
        )
        .unwrap();

        let filter = EligibilityFilter::new();
        let package = filter.inspect(temp.path()).unwrap();

        assert!(package.is_eligible());
        assert_eq!(package.sources, vec![temp.path().join("a.go")]);
    }

    #[test]
    fn test_reflect_in_test_file_disqualifies() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.go"), "package a\n").unwrap();
        fs::write(
            temp.path().join("a_test.go"),
            "package a\n\nimport \"reflect\"\n",
        )
        .unwrap();

        let filter = EligibilityFilter::new();
        assert_eq!(
            filter.classify(temp.path()).unwrap(),
            Eligibility::ImportsReflect {
                file: temp.path().join("a_test.go")
            }
        );
    }

    #[test]
    fn test_nested_sources_are_not_considered() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/b.go"), "package b\n").unwrap();

        let filter = EligibilityFilter::new();
        assert_eq!(filter.classify(temp.path()).unwrap(), Eligibility::NoSources);
    }

    #[test]
    fn test_directory_named_like_source_is_ignored() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("weird.go")).unwrap();

        let filter = EligibilityFilter::new();
        assert_eq!(filter.classify(temp.path()).unwrap(), Eligibility::NoSources);
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.go"), "not go at all").unwrap();

        let filter = EligibilityFilter::new();
        let err = filter.classify(temp.path()).unwrap_err();
        assert!(matches!(err, ScanError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_verdict_is_cached() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.go"), "package a\n").unwrap();

        let filter = EligibilityFilter::new();
        assert!(filter.classify(temp.path()).unwrap().is_eligible());

        // A later change is not observed within the same run.
        fs::write(temp.path().join("b.go"), "package a\nimport \"reflect\"\n").unwrap();
        assert!(filter.classify(temp.path()).unwrap().is_eligible());
        assert_eq!(filter.cached(), 1);
    }

    #[test]
    fn test_missing_dir() {
        let filter = EligibilityFilter::new();
        let err = filter.classify(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }
}
