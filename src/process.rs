//! Invocation of external command-line tools (yt-dlp, rsgain, ffprobe).
//!
//! Every tool runs with piped output, a hard timeout and the batch
//! cancellation token. Children are spawned with `kill_on_drop`, so losing
//! the race against the timeout or the token kills the process.

use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Number of stderr lines kept in error diagnostics.
const STDERR_TAIL_LINES: usize = 4;

/// Errors that can occur while running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} was interrupted")]
    Cancelled { program: String },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl ToolError {
    /// Raw diagnostic text produced by the tool, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Run `command` to completion, bounded by `timeout` and `cancel`.
///
/// Returns the captured output when the process exits successfully, and
/// `ToolError::Failed` with the tail of stderr otherwise.
pub async fn run_tool(
    mut command: Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Output, ToolError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = ?command.as_std(), "Invoking {}", program);
    let child = command.spawn().map_err(|source| ToolError::Spawn {
        program: program.clone(),
        source,
    })?;

    let output = tokio::select! {
        result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ToolError::Wait { program, source }),
            Err(_) => return Err(ToolError::TimedOut { program, timeout }),
        },
        _ = cancel.cancelled() => return Err(ToolError::Cancelled { program }),
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program,
            status: output.status,
            stderr: stderr_tail(&output.stderr),
        })
    }
}

/// Check whether `program` can be started and answers `arg` successfully.
pub async fn check_available(program: &Path, arg: &str) -> bool {
    let status = Command::new(program)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    matches!(status, Ok(status) if status.success())
}

/// Last few non-empty lines of a tool's stderr, joined with " | ".
pub fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
