//! Go toolchain wrapper.

use std::path::{Path, PathBuf};

use goalign_core::CommandError;
use goalign_ops::run_checked;

use crate::error::BuildError;

/// Executable name of the Go command looked up on PATH.
pub const GO_NAME: &str = "go";

/// Values `go env GOMOD` prints when there is no main module.
const NO_MODULE: [&str; 3] = ["", "/dev/null", "NUL"];

/// Find an executable, preferring an explicitly configured path or name.
pub fn locate_tool(name: &str, configured: Option<&Path>) -> Result<PathBuf, BuildError> {
    let wanted = configured.unwrap_or_else(|| Path::new(name));
    let found = which::which(wanted).map_err(|source| BuildError::ToolNotFound {
        tool: wanted.display().to_string(),
        source,
    })?;
    tracing::debug!(tool = name, path = %found.display(), "located tool");
    Ok(found)
}

/// Runs `go` subcommands.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    go: PathBuf,
}

impl GoToolchain {
    /// Use the given `go` executable.
    pub fn new(go: impl Into<PathBuf>) -> Self {
        Self { go: go.into() }
    }

    /// Locate `go`, honoring a configured override.
    pub fn locate(configured: Option<&Path>) -> Result<Self, BuildError> {
        locate_tool(GO_NAME, configured).map(Self::new)
    }

    /// Path of the `go` executable.
    pub fn program(&self) -> &Path {
        &self.go
    }

    /// Path of the `go.mod` governing `dir`, if any.
    pub async fn module_file(&self, dir: &Path) -> Result<Option<PathBuf>, CommandError> {
        let output = run_checked(&self.go, &["env", "GOMOD"], dir).await?;
        Ok(parse_gomod(&output))
    }

    /// Directory containing the `go.mod` governing `dir`.
    pub async fn module_root(&self, dir: &Path) -> Result<PathBuf, BuildError> {
        let module_file = self
            .module_file(dir)
            .await
            .map_err(|source| BuildError::ModuleLookup {
                dir: dir.to_path_buf(),
                source,
            })?;

        module_file
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| BuildError::NoModuleRoot {
                dir: dir.to_path_buf(),
            })
    }

    /// `go mod tidy` in `root`.
    pub async fn tidy(&self, root: &Path) -> Result<String, CommandError> {
        run_checked(&self.go, &["mod", "tidy"], root).await
    }

    /// `go mod vendor` in `root`.
    pub async fn vendor(&self, root: &Path) -> Result<String, CommandError> {
        run_checked(&self.go, &["mod", "vendor"], root).await
    }

    /// `go test ./...` in `root`.
    pub async fn test(&self, root: &Path) -> Result<String, CommandError> {
        run_checked(&self.go, &["test", "./..."], root).await
    }

    /// `go build [flags]` in `dir`.
    pub async fn build(&self, dir: &Path, flags: &[String]) -> Result<String, CommandError> {
        run_checked(&self.go, &build_args(flags), dir).await
    }
}

fn build_args(flags: &[String]) -> Vec<&str> {
    std::iter::once("build")
        .chain(flags.iter().map(String::as_str))
        .collect()
}

fn parse_gomod(output: &str) -> Option<PathBuf> {
    let trimmed = output.trim();
    if NO_MODULE.contains(&trimmed) {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}
