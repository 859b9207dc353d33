//! Artifact probing using ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::process::{run_tool, ToolError};

/// Errors that can occur while probing a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// Media information extracted from ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<Duration>,
    /// Audio codec name, if an audio stream was found.
    pub codec: Option<String>,
    /// Container format name (e.g., "mp3", "ogg").
    pub format: String,
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path, cancel: &CancellationToken)
        -> Result<MediaInfo, ProbeError>;
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
}

/// Parse the JSON printed by `ffprobe -print_format json -show_format -show_streams`.
pub fn parse_ffprobe_output(json: &str) -> Result<MediaInfo, ProbeError> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ProbeError::InvalidOutput(format!("JSON parse error: {}", e)))?;

    let audio_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| ProbeError::InvalidOutput("No audio stream found".to_string()))?;

    // ffprobe reports seconds as a decimal string
    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    Ok(MediaInfo {
        duration,
        codec: audio_stream.codec_name.clone(),
        format: probe.format.format_name,
    })
}

pub struct FfProbe {
    bin_path: PathBuf,
    timeout: Duration,
}

impl FfProbe {
    pub fn new(bin_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin_path: bin_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl MediaProber for FfProbe {
    async fn probe(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<MediaInfo, ProbeError> {
        let mut command = Command::new(&self.bin_path);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);
        let output = run_tool(command, self.timeout, cancel).await?;
        parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))
    }
}
