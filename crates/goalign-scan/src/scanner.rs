//! JWalk-based tree scanner producing rewrite tasks.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jwalk::WalkDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use goalign_core::{Eligibility, OptimizeTask, RewriteOptions, ScanError, ScanSummary};

use crate::eligibility::EligibilityFilter;

/// Walks a source tree and emits one task per eligible package directory.
pub struct TreeScanner {
    filter: EligibilityFilter,
    options: RewriteOptions,
}

impl TreeScanner {
    /// Create a scanner whose tasks carry the given rewrite options.
    pub fn new(options: RewriteOptions) -> Self {
        Self {
            filter: EligibilityFilter::new(),
            options,
        }
    }

    /// Access the eligibility filter and its cached verdicts.
    pub fn filter(&self) -> &EligibilityFilter {
        &self.filter
    }

    /// Scan `root`, sending tasks to `tasks` as they are found.
    ///
    /// Blocks the calling thread; run it on a blocking task when the
    /// receiver lives on an async runtime. Stops without error when `cancel`
    /// fires or the receiver is dropped. Tasks already sent are never
    /// recalled, even when a later directory fails.
    pub fn scan(
        &self,
        root: &Path,
        tasks: &mpsc::Sender<OptimizeTask>,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary, ScanError> {
        self.walk(root, cancel, |task| tasks.blocking_send(task).is_ok())
    }

    /// Scan `root` and collect every task instead of streaming them.
    pub fn plan(&self, root: &Path) -> Result<(Vec<OptimizeTask>, ScanSummary), ScanError> {
        let mut planned = Vec::new();
        let summary = self.walk(root, &CancellationToken::new(), |task| {
            planned.push(task);
            true
        })?;
        Ok((planned, summary))
    }

    fn walk(
        &self,
        root: &Path,
        cancel: &CancellationToken,
        mut emit: impl FnMut(OptimizeTask) -> bool,
    ) -> Result<ScanSummary, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|e| ScanError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let hidden_skipped = Arc::new(AtomicU64::new(0));
        let walker = WalkDir::new(root)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(0)
            .process_read_dir(pruning_hidden_dirs(Arc::clone(&hidden_skipped)));

        let mut summary = ScanSummary::default();

        for entry_result in walker {
            if cancel.is_cancelled() {
                tracing::debug!(root = %root.display(), "scan cancelled");
                break;
            }

            let entry = entry_result.map_err(|err| ScanError::Walk {
                path: err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf()),
                message: err.to_string(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(err) = entry.read_children_error.as_ref() {
                return Err(ScanError::Walk {
                    path: entry.path(),
                    message: err.to_string(),
                });
            }

            let dir = entry.path();
            summary.dirs_visited += 1;

            match self.filter.classify(&dir)? {
                Eligibility::Eligible => {
                    tracing::debug!(dir = %dir.display(), "eligible package");
                    summary.eligible += 1;
                    if !emit(OptimizeTask::new(&dir, self.options)) {
                        tracing::debug!("task receiver closed, stopping scan");
                        break;
                    }
                    summary.tasks_dispatched += 1;
                }
                Eligibility::NoSources => summary.without_sources += 1,
                Eligibility::ImportsReflect { file } => {
                    tracing::info!(
                        dir = %dir.display(),
                        file = %file.display(),
                        "skipping package that imports reflect"
                    );
                    summary.reflect_skipped += 1;
                }
            }
        }

        summary.hidden_skipped = hidden_skipped.load(Ordering::Relaxed);
        Ok(summary)
    }
}

/// Entry type handed to jwalk's `process_read_dir` callback.
pub type WalkEntry = Result<jwalk::DirEntry<((), ())>, jwalk::Error>;

/// Build a `process_read_dir` callback that drops hidden directories
/// before jwalk descends into them, counting each one in `counter`.
pub fn pruning_hidden_dirs(
    counter: Arc<AtomicU64>,
) -> impl Fn(Option<usize>, &Path, &mut (), &mut Vec<WalkEntry>) + Send + Sync + 'static {
    move |_depth: Option<usize>, _path: &Path, _state: &mut (), children: &mut Vec<WalkEntry>| {
        children.retain(|entry| match entry {
            Ok(entry) if entry.file_type.is_dir() && is_hidden_name(&entry.file_name) => {
                counter.fetch_add(1, Ordering::Relaxed);
                false
            }
            _ => true,
        });
    }
}

/// Check if a file name starts with the hidden-file marker.
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Paths of all tasks, sorted; handy for reporting.
pub fn task_dirs(tasks: &[OptimizeTask]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = tasks.iter().map(|t| t.dir.clone()).collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_module() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::write(root.join("go.mod"), "module example.com/demo\n").unwrap();
        fs::write(root.join("main.go"), "package main\nimport \"fmt\"\n").unwrap();

        fs::create_dir_all(root.join("internal/fast")).unwrap();
        fs::write(root.join("internal/fast/fast.go"), "package fast\n").unwrap();

        fs::create_dir_all(root.join("internal/codec")).unwrap();
        fs::write(
            root.join("internal/codec/codec.go"),
            "package codec\nimport \"reflect\"\n",
        )
        .unwrap();

        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/index.md"), "# docs").unwrap();

        fs::create_dir_all(root.join(".git/hooks")).unwrap();
        fs::write(root.join(".git/hooks/hook.go"), "package hooks\n").unwrap();
        // Would fail to parse if it were ever visited.
        fs::write(root.join(".git/broken.go"), "garbage").unwrap();

        temp
    }

    #[test]
    fn test_plan_emits_eligible_packages() {
        let temp = create_test_module();
        let scanner = TreeScanner::new(RewriteOptions::default());

        let (tasks, summary) = scanner.plan(temp.path()).unwrap();

        assert_eq!(
            task_dirs(&tasks),
            vec![
                temp.path().to_path_buf(),
                temp.path().join("internal/fast"),
            ]
        );
        assert_eq!(summary.tasks_dispatched, 2);
        assert_eq!(summary.reflect_skipped, 1);
        // docs and internal
        assert_eq!(summary.without_sources, 2);
        assert_eq!(summary.hidden_skipped, 1);
    }

    #[test]
    fn test_hidden_dirs_are_never_classified() {
        let temp = create_test_module();
        let scanner = TreeScanner::new(RewriteOptions::default());

        scanner.plan(temp.path()).unwrap();

        // root, internal, internal/fast, internal/codec, docs
        assert_eq!(scanner.filter().cached(), 5);
    }

    #[test]
    fn test_tasks_carry_options() {
        let temp = create_test_module();
        let options = RewriteOptions {
            generated_files: false,
            test_files: false,
        };
        let scanner = TreeScanner::new(options);

        let (tasks, _) = scanner.plan(temp.path()).unwrap();
        assert!(tasks.iter().all(|t| t.options == options));
    }

    #[test]
    fn test_scan_streams_into_channel() {
        let temp = create_test_module();
        let scanner = TreeScanner::new(RewriteOptions::default());
        let (tx, mut rx) = mpsc::channel(16);

        let summary = scanner
            .scan(temp.path(), &tx, &CancellationToken::new())
            .unwrap();
        drop(tx);

        let mut received = Vec::new();
        while let Ok(task) = rx.try_recv() {
            received.push(task);
        }
        assert_eq!(received.len() as u64, summary.tasks_dispatched);
    }

    #[test]
    fn test_cancelled_scan_emits_nothing() {
        let temp = create_test_module();
        let scanner = TreeScanner::new(RewriteOptions::default());
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = scanner.scan(temp.path(), &tx, &cancel).unwrap();

        assert_eq!(summary.tasks_dispatched, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_parse_error_aborts_scan() {
        let temp = create_test_module();
        fs::write(temp.path().join("internal/fast/bad.go"), "package").unwrap();
        let scanner = TreeScanner::new(RewriteOptions::default());

        let err = scanner.plan(temp.path()).unwrap_err();
        assert!(matches!(err, ScanError::Parse { .. }));
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = create_test_module();
        let scanner = TreeScanner::new(RewriteOptions::default());

        let err = scanner.plan(&temp.path().join("go.mod")).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory { .. }));
    }

    #[test]
    fn test_is_hidden_name() {
        assert!(is_hidden_name(OsStr::new(".git")));
        assert!(!is_hidden_name(OsStr::new("vendor")));
    }
}
