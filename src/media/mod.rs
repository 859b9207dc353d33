//! Audio artifact formats and probing.

mod probe;

pub use probe::{parse_ffprobe_output, FfProbe, MediaInfo, MediaProber, ProbeError};

#[cfg(any(test, feature = "mock"))]
pub use probe::MockMediaProber;

use clap::ValueEnum;
use std::path::Path;

/// Extensions recognized as an already attached audio artifact.
///
/// `webm` is left out: song folders keep the music video as `.webm`.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "ogg", "flac", "wav", "aac", "wma"];

/// Audio format requested from the fetch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Opus,
    Flac,
    Wav,
}

impl AudioFormat {
    /// File extension of the produced artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
        }
    }
}

/// Check if a path has a recognized audio extension (case-insensitive).
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}
