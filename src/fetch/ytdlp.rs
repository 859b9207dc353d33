//! yt-dlp process adapter for [`FetchEngine`].

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::RegexSet;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::engine::{FetchEngine, FetchError, FetchErrorKind, FetchRequest};
use crate::media::is_audio_path;
use crate::process::run_tool;

lazy_static! {
    // First matching set wins, see classify_failure for the order.
    static ref NOT_FOUND_PATTERNS: RegexSet = RegexSet::new([
        r"(?i)video unavailable",
        r"(?i)this video (has been|is) (removed|no longer available|private)",
        r"(?i)private video",
        r"(?i)video does not exist",
        r"(?i)incomplete youtube id",
        r"(?i)account associated with this video has been terminated",
        r"(?i)HTTP Error 404",
    ])
    .expect("valid not-found patterns");

    static ref BLOCKED_PATTERNS: RegexSet = RegexSet::new([
        r"(?i)available in your country",
        r"(?i)blocked it (in your country|on copyright grounds)",
        r"(?i)geo.?restrict",
        r"(?i)sign in to confirm your age",
        r"(?i)age.?restricted",
        r"(?i)members.?only",
        r"(?i)HTTP Error 403",
    ])
    .expect("valid blocked patterns");

    static ref RATE_LIMITED_PATTERNS: RegexSet = RegexSet::new([
        r"(?i)HTTP Error 429",
        r"(?i)too many requests",
        r"(?i)rate.?limit",
        r"(?i)sign in to confirm you.?re not a bot",
    ])
    .expect("valid rate-limit patterns");

    static ref NETWORK_PATTERNS: RegexSet = RegexSet::new([
        r"(?i)unable to download (webpage|api page)",
        r"(?i)connection (refused|reset|aborted)",
        r"(?i)name or service not known",
        r"(?i)temporary failure in name resolution",
        r"(?i)getaddrinfo failed",
        r"(?i)network is unreachable",
        r"(?i)timed out",
        r"(?i)HTTP Error 5\d\d",
    ])
    .expect("valid network patterns");
}

/// Classify a yt-dlp failure from its stderr.
pub fn classify_failure(stderr: &str) -> FetchErrorKind {
    // geo blocks and bot checks are reported as "Video unavailable. <reason>"
    if BLOCKED_PATTERNS.is_match(stderr) {
        FetchErrorKind::Blocked
    } else if RATE_LIMITED_PATTERNS.is_match(stderr) {
        FetchErrorKind::RateLimited
    } else if NOT_FOUND_PATTERNS.is_match(stderr) {
        FetchErrorKind::NotFound
    } else if NETWORK_PATTERNS.is_match(stderr) {
        FetchErrorKind::Network
    } else {
        FetchErrorKind::Unknown
    }
}

pub struct YtDlp {
    bin_path: PathBuf,
}

impl YtDlp {
    pub fn new(bin_path: impl Into<PathBuf>) -> Self {
        Self {
            bin_path: bin_path.into(),
        }
    }

    fn build_command(&self, request: &FetchRequest) -> Command {
        let mut command = Command::new(&self.bin_path);
        command
            .env("PYTHONIOENCODING", "UTF-8")
            .args(["--no-playlist", "--no-progress", "--no-warnings"])
            .args(["--format", "bestaudio/best"])
            .arg("--extract-audio")
            .args(["--audio-format", request.audio_format.extension()])
            .args(["--audio-quality", "0"])
            .arg("--paths")
            .arg(&request.staging_dir)
            .arg("--output")
            .arg(format!("{}.%(ext)s", request.file_stem))
            .args(["--print", "after_move:filepath", "--no-simulate"])
            // ids may start with '-'
            .arg("--")
            .arg(&request.video_id);
        command
    }
}

/// Resolve the produced artifact from the printed path, falling back to
/// scanning the staging directory for an audio file named after the stem.
fn resolve_artifact(stdout: &str, request: &FetchRequest) -> Option<PathBuf> {
    let printed = stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .find(|path| path.is_file());
    if printed.is_some() {
        return printed;
    }
    scan_staging_dir(&request.staging_dir, &request.file_stem)
}

fn scan_staging_dir(staging_dir: &Path, file_stem: &str) -> Option<PathBuf> {
    std::fs::read_dir(staging_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| {
            path.is_file()
                && is_audio_path(path)
                && path.file_stem().and_then(|s| s.to_str()) == Some(file_stem)
        })
}

#[async_trait]
impl FetchEngine for YtDlp {
    #[instrument(name = "yt-dlp", skip(self, request, cancel), fields(video_id = %request.video_id))]
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let command = self.build_command(request);
        let output = run_tool(command, request.timeout, cancel)
            .await
            .map_err(|err| FetchError::from_tool_error(err, classify_failure))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("yt-dlp finished, stdout: {}", stdout.trim());
        resolve_artifact(&stdout, request).ok_or_else(|| {
            FetchError::new(
                FetchErrorKind::Unknown,
                "yt-dlp reported success but produced no audio file",
            )
        })
    }
}
