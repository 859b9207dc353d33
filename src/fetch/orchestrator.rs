//! Places the audio of one video reference into a song folder.
//!
//! The fetch engine writes into a private staging directory created inside
//! the song folder, so a partial download never sits under the final name and
//! the final move is a same-filesystem rename. The staging directory is
//! removed when it goes out of scope, whatever the outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::engine::{FetchEngine, FetchError, FetchRequest};
use crate::description::VideoReference;
use crate::media::{is_audio_path, AudioFormat, MediaProber};

const STAGING_PREFIX: &str = ".usdx-fetch-";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("audio already present at {}", path.display())]
    ArtifactAlreadyExists { path: PathBuf },

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("song folder has no usable name: {}", path.display())]
    InvalidFolder { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type DownloadResult = Result<DownloadedAudio, DownloadError>;

/// A validated audio file placed in its song folder.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedAudio {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Detected duration, when a prober is available and succeeded.
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub audio_format: AudioFormat,
    /// Upper bound for one fetch-engine invocation.
    pub timeout: Duration,
    pub overwrite_existing: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::default(),
            timeout: Duration::from_secs(600),
            overwrite_existing: false,
        }
    }
}

pub struct DownloadOrchestrator {
    engine: Arc<dyn FetchEngine>,
    prober: Option<Arc<dyn MediaProber>>,
    settings: DownloadSettings,
}

impl DownloadOrchestrator {
    pub fn new(
        engine: Arc<dyn FetchEngine>,
        prober: Option<Arc<dyn MediaProber>>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            engine,
            prober,
            settings,
        }
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    /// Conventional artifact path: `<folder>/<folder-name>.<audio_format>`.
    pub fn output_path(&self, song_folder: &Path) -> Result<PathBuf, DownloadError> {
        let stem = file_stem_for(song_folder)?;
        Ok(song_folder.join(format!("{}.{}", stem, self.settings.audio_format.extension())))
    }

    /// Download the audio for `reference` into `song_folder`.
    #[instrument(skip(self, reference, cancel), fields(video_id = %reference.id))]
    pub async fn download(
        &self,
        reference: &VideoReference,
        song_folder: &Path,
        cancel: &CancellationToken,
    ) -> DownloadResult {
        let stem = file_stem_for(song_folder)?;

        let existing = existing_artifacts(song_folder, &stem)?;
        if !self.settings.overwrite_existing {
            if let Some(path) = existing.into_iter().next() {
                return Err(DownloadError::ArtifactAlreadyExists { path });
            }
        }

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(song_folder)?;
        let request = FetchRequest {
            video_id: reference.id.clone(),
            staging_dir: staging.path().to_path_buf(),
            file_stem: stem.clone(),
            audio_format: self.settings.audio_format,
            timeout: self.settings.timeout,
        };

        info!("Fetching audio for {}", reference.id);
        let produced = self.engine.fetch(&request, cancel).await?;
        let size_bytes = validate_artifact(&produced, staging.path())?;

        let duration = match &self.prober {
            Some(prober) => match prober.probe(&produced, cancel).await {
                Ok(media) => media.duration,
                Err(e) => {
                    warn!("Could not probe {}: {}", produced.display(), e);
                    None
                }
            },
            None => None,
        };

        let extension = produced
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.settings.audio_format.extension().to_string());
        let final_path = song_folder.join(format!("{}.{}", stem, extension));
        fs::rename(&produced, &final_path)?;
        debug!("Moved {} to {}", produced.display(), final_path.display());

        // Replaced artifacts with another extension would shadow the new one.
        if let Ok(stale) = existing_artifacts(song_folder, &stem) {
            for path in stale.into_iter().filter(|p| p != &final_path) {
                match fs::remove_file(&path) {
                    Ok(()) => info!("Removed replaced artifact {}", path.display()),
                    Err(e) => warn!("Could not remove {}: {}", path.display(), e),
                }
            }
        }

        Ok(DownloadedAudio {
            path: final_path,
            size_bytes,
            duration,
        })
    }
}

fn file_stem_for(song_folder: &Path) -> Result<String, DownloadError> {
    song_folder
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DownloadError::InvalidFolder {
            path: song_folder.to_path_buf(),
        })
}

/// Audio files in `song_folder` named `<stem>.<recognized extension>`, sorted.
fn existing_artifacts(song_folder: &Path, stem: &str) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(song_folder)? {
        let path = entry?.path();
        if path.is_file()
            && is_audio_path(&path)
            && path.file_stem().and_then(|s| s.to_str()) == Some(stem)
        {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Check the engine's artifact and return its size.
fn validate_artifact(produced: &Path, staging_dir: &Path) -> Result<u64, DownloadError> {
    if !produced.starts_with(staging_dir) {
        return Err(DownloadError::InvalidArtifact(format!(
            "{} is outside the staging directory",
            produced.display()
        )));
    }
    let metadata = fs::metadata(produced).map_err(|_| {
        DownloadError::InvalidArtifact(format!("{} does not exist", produced.display()))
    })?;
    if !metadata.is_file() {
        return Err(DownloadError::InvalidArtifact(format!(
            "{} is not a file",
            produced.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(DownloadError::InvalidArtifact(format!(
            "{} is empty",
            produced.display()
        )));
    }
    if !is_audio_path(produced) {
        return Err(DownloadError::InvalidArtifact(format!(
            "{} has no playable audio extension",
            produced.display()
        )));
    }
    Ok(metadata.len())
}
