use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::discovery::{inspect_folder, list_song_folders, DiscoveryError};
use super::outcome::{SongFailure, SongOutcome, StageReport};
use super::permissions::fix_permissions;
use crate::description::{
    extract, file_name, update_headers, ExtractorOptions, SongDescription, VideoReference,
    BACKGROUND_KEY, COVER_KEY, DESCRIPTION_EXTENSION, MP3_KEY,
};
use crate::fetch::{
    DownloadError, DownloadOrchestrator, DownloadResult, FetchError, FetchErrorKind, RetryPolicy,
};
use crate::post_process::{supports_id3, write_song_tags, PostProcessor};

/// Per-run options of the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSettings {
    pub extractor: ExtractorOptions,
    pub write_id3_tags: bool,
    pub update_description: bool,
    /// Set the song folder's files to `SONG_FILE_MODE` after a download.
    pub fix_permissions: bool,
    pub retry: RetryPolicy,
}

pub struct BatchRunner {
    orchestrator: DownloadOrchestrator,
    /// Present when loudness normalization is enabled for the run.
    post_processor: Option<PostProcessor>,
    settings: BatchSettings,
}

impl BatchRunner {
    pub fn new(
        orchestrator: DownloadOrchestrator,
        post_processor: Option<PostProcessor>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            orchestrator,
            post_processor,
            settings,
        }
    }

    /// Process every song folder under `root`, in name order.
    ///
    /// Per-song failures are recorded on the outcomes. Only an unusable root
    /// is an error. When `cancel` fires, the song in progress is recorded as
    /// interrupted and the outcomes collected so far are returned.
    pub async fn run(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<SongOutcome>, DiscoveryError> {
        let folders = list_song_folders(root)?;
        info!("Found {} song folders in {}", folders.len(), root.display());

        let mut outcomes = Vec::with_capacity(folders.len());
        for (index, folder) in folders.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Run interrupted, {} song folders not processed",
                    folders.len() - index
                );
                break;
            }
            let outcome = self.process_song(folder, cancel).await;
            match outcome.failure() {
                Some(failure) => warn!(
                    "{}: {} ({})",
                    outcome.name(),
                    failure.category(),
                    failure.diagnostic()
                ),
                None => info!("{}: {}", outcome.name(), outcome.status()),
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    #[instrument(skip(self, cancel), fields(song = %folder.display()))]
    pub async fn process_song(&self, folder: &Path, cancel: &CancellationToken) -> SongOutcome {
        let started = Instant::now();
        self.process_song_stages(folder, cancel)
            .await
            .with_elapsed(started.elapsed())
    }

    async fn process_song_stages(&self, folder: &Path, cancel: &CancellationToken) -> SongOutcome {
        let contents = match inspect_folder(folder, DESCRIPTION_EXTENSION) {
            Ok(contents) => contents,
            Err(e) => return SongOutcome::failed(folder, SongFailure::Io(e.to_string())),
        };
        if contents.descriptions.len() != 1 {
            return SongOutcome::failed(
                folder,
                SongFailure::FolderAmbiguous {
                    found: contents.descriptions.len(),
                },
            );
        }
        if !self.orchestrator.settings().overwrite_existing {
            if let Some(existing) = contents.audio_files.first() {
                return SongOutcome::skipped(folder, audio_present_reason(existing));
            }
        }

        let description = match SongDescription::load(folder, &contents.descriptions[0]) {
            Ok(description) => description,
            Err(e) => {
                return SongOutcome::failed(folder, SongFailure::UnreadableDescription(e.to_string()))
            }
        };
        let reference = match extract(description.text(), &self.settings.extractor) {
            Ok(reference) => reference,
            Err(_) => return SongOutcome::failed(folder, SongFailure::ExtractionNotFound),
        };
        debug!(
            "Found {} ({}) on line {}: {}",
            reference.id,
            reference.kind.as_str(),
            reference.line_number,
            reference.raw
        );

        let (result, attempts) = self.download_with_retries(&reference, folder, cancel).await;
        let audio = match result {
            Ok(audio) => audio,
            Err(DownloadError::ArtifactAlreadyExists { path }) => {
                return SongOutcome::skipped(folder, audio_present_reason(&path))
                    .with_reference(reference)
                    .with_attempts(attempts)
            }
            Err(e) => {
                return SongOutcome::failed(folder, download_failure(e))
                    .with_reference(reference)
                    .with_attempts(attempts)
            }
        };
        info!(
            "Downloaded {} ({} bytes) to {}",
            reference.id,
            audio.size_bytes,
            audio.path.display()
        );
        let audio_path = audio.path.clone();
        let mut outcome =
            SongOutcome::downloaded(folder, reference, audio).with_attempts(attempts);

        if let Some(post_processor) = &self.post_processor {
            let report = match post_processor.normalize(&audio_path, cancel).await {
                Ok(()) => StageReport::Succeeded,
                Err(e) => {
                    warn!("Normalization of {} failed: {}", audio_path.display(), e);
                    StageReport::Failed(e.to_string())
                }
            };
            outcome.record_normalization(report);
        }

        if self.settings.write_id3_tags && supports_id3(&audio_path) {
            let report =
                match write_song_tags(&audio_path, description.title(), description.artist()) {
                    Ok(()) => StageReport::Succeeded,
                    Err(e) => {
                        warn!("Could not tag {}: {}", audio_path.display(), e);
                        StageReport::Failed(e.to_string())
                    }
                };
            outcome.record_id3_tags(report);
        }

        if self.settings.update_description {
            update_description(&description, &audio_path, &contents.images, &mut outcome);
        }

        if self.settings.fix_permissions {
            let report = match fix_permissions(folder) {
                Ok(changed) => {
                    debug!("Fixed permissions of {} files", changed);
                    StageReport::Succeeded
                }
                Err(e) => {
                    warn!("Could not fix permissions in {}: {}", folder.display(), e);
                    StageReport::Failed(e.to_string())
                }
            };
            outcome.record_permissions(report);
        }

        outcome
    }

    /// Download with the retry policy; returns the last result and the number of attempts.
    async fn download_with_retries(
        &self,
        reference: &VideoReference,
        folder: &Path,
        cancel: &CancellationToken,
    ) -> (DownloadResult, u32) {
        let mut retry_count = 0;
        loop {
            let result = self.orchestrator.download(reference, folder, cancel).await;
            let attempts = retry_count + 1;
            let kind = match &result {
                Err(DownloadError::Fetch(e)) => Some(e.kind),
                _ => None,
            };
            let Some(kind) = kind else {
                return (result, attempts);
            };
            if cancel.is_cancelled() || !self.settings.retry.should_retry(kind, retry_count) {
                return (result, attempts);
            }

            let backoff = self.settings.retry.backoff(retry_count);
            warn!(
                "Fetch of {} failed ({}), retry {}/{} in {:?}",
                reference.id,
                kind,
                retry_count + 1,
                self.settings.retry.max_retries,
                backoff
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => {
                    let interrupted = FetchError::new(
                        FetchErrorKind::Interrupted,
                        "interrupted while waiting to retry",
                    );
                    return (Err(interrupted.into()), attempts);
                }
            }
            retry_count += 1;
        }
    }
}

/// Point `#MP3` at the artifact and, when the folder has exactly one `.jpg`,
/// `#COVER` and `#BACKGROUND` at that image. Without an image both headers
/// are left as they are.
fn update_description(
    description: &SongDescription,
    audio_path: &Path,
    images: &[PathBuf],
    outcome: &mut SongOutcome,
) {
    let audio_name = match file_name(audio_path) {
        Ok(name) => name,
        Err(e) => {
            outcome.record_description_update(StageReport::Failed(e.to_string()));
            return;
        }
    };
    let cover = match images {
        [] => None,
        [image] => Some(file_name(image).map_err(|e| e.to_string())),
        _ => Some(Err(format!("{} .jpg images, expected one", images.len()))),
    };

    let mut headers = vec![(MP3_KEY, audio_name)];
    if let Some(Ok(image)) = &cover {
        headers.push((COVER_KEY, *image));
        headers.push((BACKGROUND_KEY, *image));
    }
    let report = match update_headers(description, &headers) {
        Ok(changed) => {
            if changed {
                debug!("Updated headers in {}", description.path().display());
            }
            StageReport::Succeeded
        }
        Err(e) => {
            error!("Could not update {}: {}", description.path().display(), e);
            StageReport::Failed(e.to_string())
        }
    };

    match cover {
        None => {}
        Some(Ok(_)) => outcome.record_cover(report.clone()),
        Some(Err(reason)) => {
            warn!("Cover not set: {}", reason);
            outcome.record_cover(StageReport::Failed(reason));
        }
    }
    outcome.record_description_update(report);
}

fn audio_present_reason(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("audio already present: {}", name)
}

fn download_failure(err: DownloadError) -> SongFailure {
    match err {
        DownloadError::Fetch(e) => SongFailure::Fetch(e),
        DownloadError::InvalidArtifact(detail) => SongFailure::InvalidArtifact(detail),
        other => SongFailure::Io(other.to_string()),
    }
}
