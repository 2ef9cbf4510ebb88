//! Staged build orchestration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::mpsc;

use goalign_core::{PipelineConfig, RunResult, ScanSummary};
use goalign_ops::{
    CopyStats, REWRITER_NAME, Rewriter, TASK_CHANNEL_SIZE, WorkerPool, copy_tree,
};
use goalign_scan::{TreeScanner, task_dirs};

use crate::error::BuildError;
use crate::reconcile::{ArtifactReconciler, Reconciliation};
use crate::report::{BuildReport, DryRunReport};
use crate::staging::StagingArea;
use crate::toolchain::{GoToolchain, locate_tool};

/// Builds a Go module in a staging copy after realigning struct fields.
///
/// The caller's tree is only read; the one write outside the staging tree
/// is the copied executable.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    go: GoToolchain,
    rewriter: Rewriter,
}

/// Everything produced inside the staging tree.
struct StagedBuild {
    copy: CopyStats,
    scan: ScanSummary,
    rewrite: RunResult,
    tests_output: Option<String>,
    artifact: Reconciliation,
}

/// Outcome of removing (or keeping) the staging tree.
struct Cleanup {
    path: PathBuf,
    kept: bool,
    error: Option<String>,
}

impl Pipeline {
    /// Create a pipeline, locating `go` and the rewriter.
    pub fn new(config: PipelineConfig) -> Result<Self, BuildError> {
        let go = GoToolchain::locate(config.go_binary.as_deref())?;
        let rewriter = Rewriter::new(locate_tool(
            REWRITER_NAME,
            config.rewriter_binary.as_deref(),
        )?);
        tracing::debug!(
            go = %go.program().display(),
            rewriter = %rewriter.program().display(),
            "located tools"
        );
        Ok(Self::with_tools(config, go, rewriter))
    }

    /// Create a pipeline with already located tools.
    pub fn with_tools(config: PipelineConfig, go: GoToolchain, rewriter: Rewriter) -> Self {
        Self {
            config,
            go,
            rewriter,
        }
    }

    /// Configuration of this pipeline.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for the module containing `invocation_dir`.
    ///
    /// The staging tree is cleaned up on success and on failure.
    pub async fn run(&self, invocation_dir: &Path) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let module_root = self.go.module_root(invocation_dir).await?;
        tracing::info!(module = %module_root.display(), "found module");

        let staging = StagingArea::create(&self.staging_base())?;
        let staged = self.build_staged(&staging, &module_root, invocation_dir).await;
        let cleanup = self.cleanup(staging).await;
        let staged = staged?;

        Ok(BuildReport {
            invocation_dir: invocation_dir.to_path_buf(),
            module_root,
            staging_dir: cleanup.path,
            staging_kept: cleanup.kept,
            staging_cleanup_error: cleanup.error,
            copy: staged.copy,
            scan: staged.scan,
            rewrite: staged.rewrite,
            tests_output: staged.tests_output,
            artifact: staged.artifact,
            elapsed: started.elapsed(),
        })
    }

    /// Stage the module and list the packages that would be rewritten.
    ///
    /// Nothing is rewritten or built.
    pub async fn dry_run(&self, invocation_dir: &Path) -> Result<DryRunReport, BuildError> {
        let started = Instant::now();
        let module_root = self.go.module_root(invocation_dir).await?;
        tracing::info!(module = %module_root.display(), "found module");

        let staging = StagingArea::create(&self.staging_base())?;
        let planned = self.plan_staged(&staging, &module_root).await;
        let cleanup = self.cleanup(staging).await;
        let (copy, scan, packages) = planned?;

        Ok(DryRunReport {
            invocation_dir: invocation_dir.to_path_buf(),
            module_root,
            staging_dir: cleanup.path,
            staging_kept: cleanup.kept,
            staging_cleanup_error: cleanup.error,
            copy,
            scan,
            packages,
            elapsed: started.elapsed(),
        })
    }

    fn staging_base(&self) -> PathBuf {
        self.config
            .staging_base
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    async fn build_staged(
        &self,
        staging: &StagingArea,
        module_root: &Path,
        invocation_dir: &Path,
    ) -> Result<StagedBuild, BuildError> {
        let root = staging.path();
        let copy = self.stage(module_root, root).await?;
        self.resolve_dependencies(root).await?;
        let (scan, rewrite) = self.rewrite_packages(root, module_root).await?;

        let tests_output = if self.config.run_tests {
            tracing::info!("running go test ./...");
            let output = self.go.test(root).await.map_err(BuildError::Tests)?;
            tracing::info!("test output:\n{}", output.trim_end());
            Some(output)
        } else {
            None
        };

        let build_dir = staging.staged_path(module_root, invocation_dir);
        tracing::info!(dir = %build_dir.display(), "running go build");
        let build = async {
            let output = self
                .go
                .build(&build_dir, &self.config.build_flags)
                .await
                .map_err(BuildError::Build)?;
            if !output.trim().is_empty() {
                tracing::info!("{}", output.trim_end());
            }
            Ok::<(), BuildError>(())
        };
        let artifact = ArtifactReconciler::new(&build_dir)
            .reconcile(build, invocation_dir)
            .await?;

        Ok(StagedBuild {
            copy,
            scan,
            rewrite,
            tests_output,
            artifact,
        })
    }

    async fn plan_staged(
        &self,
        staging: &StagingArea,
        module_root: &Path,
    ) -> Result<(CopyStats, ScanSummary, Vec<PathBuf>), BuildError> {
        let root = staging.path().to_path_buf();
        let copy = self.stage(module_root, &root).await?;
        self.resolve_dependencies(&root).await?;

        let options = self.config.rewrite_options();
        let scan_root = root.clone();
        let (tasks, scan) =
            tokio::task::spawn_blocking(move || TreeScanner::new(options).plan(&scan_root))
                .await?
                .map_err(|err| err.rebase(&root, module_root))?;

        let packages = task_dirs(&tasks)
            .into_iter()
            .map(|dir| {
                dir.strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| dir.clone())
            })
            .collect();
        Ok((copy, scan, packages))
    }

    async fn stage(&self, module_root: &Path, root: &Path) -> Result<CopyStats, BuildError> {
        tracing::info!(staging = %root.display(), "copying module");
        let (src, dst) = (module_root.to_path_buf(), root.to_path_buf());
        let copy = tokio::task::spawn_blocking(move || copy_tree(&src, &dst)).await??;
        tracing::debug!(files = copy.files, bytes = copy.bytes, "staged module");
        Ok(copy)
    }

    async fn resolve_dependencies(&self, root: &Path) -> Result<(), BuildError> {
        tracing::info!("running go mod tidy");
        let output = self
            .go
            .tidy(root)
            .await
            .map_err(|source| BuildError::DependencyResolution {
                step: "tidy",
                source,
            })?;
        log_output(&output);

        tracing::info!("running go mod vendor");
        let output = self
            .go
            .vendor(root)
            .await
            .map_err(|source| BuildError::DependencyResolution {
                step: "vendor",
                source,
            })?;
        log_output(&output);
        Ok(())
    }

    /// Scan the staging tree and rewrite packages while the scan is running.
    ///
    /// Scan errors name paths in `module_root`, since the staging tree is
    /// gone by the time they are shown.
    async fn rewrite_packages(
        &self,
        root: &Path,
        module_root: &Path,
    ) -> Result<(ScanSummary, RunResult), BuildError> {
        let pool = WorkerPool::new(self.rewriter.clone(), &self.config);
        let (tx, rx) = mpsc::channel(TASK_CHANNEL_SIZE);

        let scanner = TreeScanner::new(self.config.rewrite_options());
        let scan_root = root.to_path_buf();
        let cancel = pool.cancellation_token();
        let producer = tokio::task::spawn_blocking(move || scanner.scan(&scan_root, &tx, &cancel));

        tracing::info!(
            jobs = pool.max_concurrency(),
            passes = pool.passes(),
            "rewriting packages"
        );
        let run = pool.run(rx).await;
        let scan = producer
            .await?
            .map_err(|err| err.rebase(root, module_root))?;

        if let Some(first) = run.first_failure.clone() {
            return Err(BuildError::Rewrite {
                failed: run.failed(),
                first,
            });
        }

        tracing::info!(
            packages = run.succeeded(),
            reflect_skipped = scan.reflect_skipped,
            elapsed_ms = run.elapsed.as_millis() as u64,
            "rewrote packages"
        );
        Ok((scan, run))
    }

    async fn cleanup(&self, staging: StagingArea) -> Cleanup {
        if self.config.keep_staging {
            let path = staging.keep();
            tracing::info!(path = %path.display(), "keeping staging directory");
            return Cleanup {
                path,
                kept: true,
                error: None,
            };
        }

        let path = staging.path().to_path_buf();
        let removed = tokio::task::spawn_blocking(move || staging.remove()).await;
        let error = match removed {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(err) => Some(err.to_string()),
        };
        if let Some(err) = &error {
            tracing::warn!(path = %path.display(), "failed to remove staging directory: {err}");
        }
        Cleanup {
            path,
            kept: false,
            error,
        }
    }
}

fn log_output(output: &str) {
    let output = output.trim();
    if !output.is_empty() {
        tracing::debug!("{output}");
    }
}
