//! Boundary to the external video-fetch engine.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::media::AudioFormat;
use crate::process::ToolError;

/// Category of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Network,     // Connection problems, DNS, resets
    NotFound,    // Video removed, private or nonexistent - never retried
    Blocked,     // Region/age/copyright restrictions - never retried
    RateLimited, // HTTP 429 or bot checks
    Timeout,     // Exceeded the configured timeout
    Interrupted, // Batch cancellation - never retried
    Unknown,
}

impl FetchErrorKind {
    /// Whether retrying could ever change the result.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            FetchErrorKind::NotFound | FetchErrorKind::Blocked | FetchErrorKind::Interrupted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::NotFound => "not-found",
            FetchErrorKind::Blocked => "blocked",
            FetchErrorKind::RateLimited => "rate-limited",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Interrupted => "interrupted",
            FetchErrorKind::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "network" => Some(FetchErrorKind::Network),
            "not-found" => Some(FetchErrorKind::NotFound),
            "blocked" => Some(FetchErrorKind::Blocked),
            "rate-limited" => Some(FetchErrorKind::RateLimited),
            "timeout" => Some(FetchErrorKind::Timeout),
            "interrupted" => Some(FetchErrorKind::Interrupted),
            "unknown" => Some(FetchErrorKind::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized failure reported by the fetch engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    /// Raw diagnostic from the engine (usually the tail of its stderr).
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Map a tool invocation error, using `classify` for engine-reported failures.
    pub fn from_tool_error(err: ToolError, classify: impl Fn(&str) -> FetchErrorKind) -> Self {
        let kind = match &err {
            ToolError::TimedOut { .. } => FetchErrorKind::Timeout,
            ToolError::Cancelled { .. } => FetchErrorKind::Interrupted,
            ToolError::Failed { stderr, .. } => classify(stderr),
            ToolError::Spawn { .. } | ToolError::Wait { .. } => FetchErrorKind::Unknown,
        };
        let message = match err.stderr() {
            Some(stderr) if !stderr.is_empty() => stderr.to_string(),
            _ => err.to_string(),
        };
        Self { kind, message }
    }
}

/// What to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub video_id: String,
    /// Directory the engine writes into; owned by the caller.
    pub staging_dir: PathBuf,
    /// File name of the artifact without extension.
    pub file_stem: String,
    pub audio_format: AudioFormat,
    pub timeout: Duration,
}

/// External engine able to retrieve the audio of a video by identifier.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Fetch audio-only media at the best available quality.
    ///
    /// Returns the path of the produced artifact inside `request.staging_dir`.
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError>;
}
