//! Field-alignment rewriter invocation.

use std::path::{Path, PathBuf};

use goalign_core::{CommandError, OptimizeTask, RewriteOptions};

use crate::command::{describe_command, run_checked};

/// Executable name of the rewriter looked up on PATH.
pub const REWRITER_NAME: &str = "betteralign";

/// Runs the struct field-alignment rewriter in a package directory.
#[derive(Debug, Clone)]
pub struct Rewriter {
    program: PathBuf,
}

impl Rewriter {
    /// Create a rewriter that runs `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Path of the rewriter executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one invocation: apply in place on the current package.
    pub fn args(options: RewriteOptions) -> Vec<&'static str> {
        let mut args = vec!["-apply"];
        if options.generated_files {
            args.push("-generated_files");
        }
        if options.test_files {
            args.push("-test_files");
        }
        args.push(".");
        args
    }

    /// Full command line for a task, as it would be logged.
    pub fn command_line(&self, task: &OptimizeTask) -> String {
        describe_command(&self.program, &Self::args(task.options))
    }

    /// Run one rewrite pass over the task's directory.
    ///
    /// Returns the combined output of the rewriter on success.
    pub async fn apply(&self, task: &OptimizeTask) -> Result<String, CommandError> {
        run_checked(&self.program, &Self::args(task.options), &task.dir).await
    }
}
