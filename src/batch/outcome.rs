use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::description::VideoReference;
use crate::fetch::{DownloadedAudio, FetchError};

/// Terminal status of one song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SongStatus {
    Skipped,
    Downloaded,
    /// Downloaded and loudness tags written.
    Tagged,
    Failed,
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongStatus::Skipped => "skipped",
            SongStatus::Downloaded => "downloaded",
            SongStatus::Tagged => "tagged",
            SongStatus::Failed => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SongStatus::Failed)
    }
}

impl fmt::Display for SongStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a song ended Failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SongFailure {
    #[error("expected exactly one description file, found {found}")]
    FolderAmbiguous { found: usize },

    #[error("unreadable description: {0}")]
    UnreadableDescription(String),

    #[error("no video reference found in the description")]
    ExtractionNotFound,

    #[error("fetch failed ({})", .0.kind)]
    Fetch(FetchError),

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl SongFailure {
    /// Short category shown in the summary.
    pub fn category(&self) -> &'static str {
        match self {
            SongFailure::FolderAmbiguous { .. } => "folder-ambiguous",
            SongFailure::UnreadableDescription(_) => "unreadable-description",
            SongFailure::ExtractionNotFound => "extraction-not-found",
            SongFailure::Fetch(e) => e.kind.as_str(),
            SongFailure::InvalidArtifact(_) => "invalid-artifact",
            SongFailure::Io(_) => "io",
        }
    }

    /// Raw diagnostic to help fix the song by hand.
    pub fn diagnostic(&self) -> String {
        match self {
            SongFailure::Fetch(e) => e.message.clone(),
            SongFailure::UnreadableDescription(detail)
            | SongFailure::InvalidArtifact(detail)
            | SongFailure::Io(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Result of an optional stage that never changes the song's status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageReport {
    #[default]
    NotRun,
    Succeeded,
    Failed(String),
}

impl StageReport {
    pub fn failure(&self) -> Option<&str> {
        match self {
            StageReport::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// What happened to one song folder during a run.
///
/// Only reachable through the constructors below: Downloaded requires a
/// video reference and Tagged requires Downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SongOutcome {
    folder: PathBuf,
    status: SongStatus,
    reference: Option<VideoReference>,
    audio: Option<DownloadedAudio>,
    failure: Option<SongFailure>,
    skip_reason: Option<String>,
    normalization: StageReport,
    id3_tags: StageReport,
    description_update: StageReport,
    cover: StageReport,
    permissions: StageReport,
    attempts: u32,
    elapsed: Duration,
}

impl SongOutcome {
    fn with_status(folder: &Path, status: SongStatus) -> Self {
        Self {
            folder: folder.to_path_buf(),
            status,
            reference: None,
            audio: None,
            failure: None,
            skip_reason: None,
            normalization: StageReport::NotRun,
            id3_tags: StageReport::NotRun,
            description_update: StageReport::NotRun,
            cover: StageReport::NotRun,
            permissions: StageReport::NotRun,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn skipped(folder: &Path, reason: impl Into<String>) -> Self {
        let mut outcome = Self::with_status(folder, SongStatus::Skipped);
        outcome.skip_reason = Some(reason.into());
        outcome
    }

    pub fn failed(folder: &Path, failure: SongFailure) -> Self {
        let mut outcome = Self::with_status(folder, SongStatus::Failed);
        outcome.failure = Some(failure);
        outcome
    }

    pub fn downloaded(folder: &Path, reference: VideoReference, audio: DownloadedAudio) -> Self {
        let mut outcome = Self::with_status(folder, SongStatus::Downloaded);
        outcome.reference = Some(reference);
        outcome.audio = Some(audio);
        outcome
    }

    /// Attach the reference that was extracted before the song stopped.
    pub fn with_reference(mut self, reference: VideoReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Record the normalization result; success promotes Downloaded to Tagged.
    pub fn record_normalization(&mut self, report: StageReport) {
        if self.status != SongStatus::Downloaded {
            return;
        }
        if report == StageReport::Succeeded {
            self.status = SongStatus::Tagged;
        }
        self.normalization = report;
    }

    pub fn record_id3_tags(&mut self, report: StageReport) {
        self.id3_tags = report;
    }

    pub fn record_description_update(&mut self, report: StageReport) {
        self.description_update = report;
    }

    /// Record the `#COVER`/`#BACKGROUND` header update.
    pub fn record_cover(&mut self, report: StageReport) {
        self.cover = report;
    }

    pub fn record_permissions(&mut self, report: StageReport) {
        self.permissions = report;
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Folder name used as the song's display name.
    pub fn name(&self) -> String {
        self.folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.display().to_string())
    }

    pub fn status(&self) -> SongStatus {
        self.status
    }

    pub fn reference(&self) -> Option<&VideoReference> {
        self.reference.as_ref()
    }

    pub fn audio(&self) -> Option<&DownloadedAudio> {
        self.audio.as_ref()
    }

    pub fn failure(&self) -> Option<&SongFailure> {
        self.failure.as_ref()
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    pub fn normalization(&self) -> &StageReport {
        &self.normalization
    }

    pub fn id3_tags(&self) -> &StageReport {
        &self.id3_tags
    }

    pub fn description_update(&self) -> &StageReport {
        &self.description_update
    }

    pub fn cover(&self) -> &StageReport {
        &self.cover
    }

    pub fn permissions(&self) -> &StageReport {
        &self.permissions
    }

    /// Number of fetch-engine invocations.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
