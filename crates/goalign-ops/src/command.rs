//! External process execution with captured output.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use goalign_core::CommandError;

/// Exit status and combined output of a finished program.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Stdout followed by stderr, lossily decoded.
    pub output: String,
}

impl CommandOutput {
    /// Check if the program exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Render a program and its arguments for logs and error messages.
pub fn describe_command<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.as_ref().to_string_lossy());
    }
    rendered
}

/// Run `program` in `cwd` to completion and capture its output.
///
/// Only a failure to start the program is an error; the exit status is
/// returned as-is.
pub async fn run_captured<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    cwd: &Path,
) -> Result<CommandOutput, CommandError> {
    tracing::debug!(cwd = %cwd.display(), "running {}", describe_command(program, args));

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(CommandOutput {
        status: output.status,
        output: combined,
    })
}

/// Run `program` in `cwd` and fail on a non-zero exit.
///
/// Returns the combined output on success.
pub async fn run_checked<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    cwd: &Path,
) -> Result<String, CommandError> {
    let output = run_captured(program, args, cwd).await?;
    if output.success() {
        Ok(output.output)
    } else {
        Err(CommandError::Failed {
            command: describe_command(program, args),
            status: output.status,
            output: output.output,
        })
    }
}
