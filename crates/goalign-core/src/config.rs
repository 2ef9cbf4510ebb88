//! Pipeline configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::task::RewriteOptions;

/// Number of packages rewritten at the same time unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Rewriter passes per package. One pass does not always reach a fixed point.
pub const DEFAULT_PASSES: usize = 2;

/// Configuration for one optimization run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct PipelineConfig {
    /// Also rewrite generated files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub generated_files: bool,

    /// Also rewrite `_test.go` files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub test_files: bool,

    /// Run `go test ./...` in the staging tree before building.
    #[builder(default = "false")]
    #[serde(default)]
    pub run_tests: bool,

    /// Extra arguments appended to `go build`.
    #[builder(default)]
    #[serde(default)]
    pub build_flags: Vec<String>,

    /// Upper bound on packages being rewritten concurrently.
    #[builder(default = "DEFAULT_MAX_CONCURRENCY")]
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Rewriter passes per package.
    #[builder(default = "DEFAULT_PASSES")]
    #[serde(default = "default_passes")]
    pub passes: usize,

    /// Stop dispatching new packages after the first failure.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub cancel_on_failure: bool,

    /// Path to the `go` binary (None = look up on PATH).
    #[builder(default)]
    #[serde(default)]
    pub go_binary: Option<PathBuf>,

    /// Path to the rewriter binary (None = look up `betteralign` on PATH).
    #[builder(default)]
    #[serde(default)]
    pub rewriter_binary: Option<PathBuf>,

    /// Directory under which the staging tree is created (None = system temp dir).
    #[builder(default)]
    #[serde(default)]
    pub staging_base: Option<PathBuf>,

    /// Leave the staging tree in place after the run.
    #[builder(default = "false")]
    #[serde(default)]
    pub keep_staging: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_passes() -> usize {
    DEFAULT_PASSES
}

impl PipelineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == Some(0) {
            return Err("max_concurrency must be at least 1".to_string());
        }
        if self.passes == Some(0) {
            return Err("passes must be at least 1".to_string());
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Create a new config builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Rewrite options carried by every task of this run.
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            generated_files: self.generated_files,
            test_files: self.test_files,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generated_files: true,
            test_files: true,
            run_tests: false,
            build_flags: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            passes: DEFAULT_PASSES,
            cancel_on_failure: true,
            go_binary: None,
            rewriter_binary: None,
            staging_base: None,
            keep_staging: false,
        }
    }
}
