//! ID3v2 tags for downloaded MP3 files, taken from the song description.

use id3::{Tag, TagLike, Version};
use std::path::Path;
use thiserror::Error;

const ALBUM: &str = "USDX library";
const ALBUM_ARTIST: &str = "Various Artists";

#[derive(Debug, Error)]
pub enum TagError {
    #[error("ID3 error: {0}")]
    Id3(#[from] id3::Error),

    #[error("not an MP3 file: {0}")]
    UnsupportedFormat(String),
}

/// Check whether ID3 tagging applies to `path`.
pub fn supports_id3(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Write title and artist, keeping every other existing frame
/// (ReplayGain frames included) except date and track number.
pub fn write_song_tags(
    path: &Path,
    title: Option<&str>,
    artist: Option<&str>,
) -> Result<(), TagError> {
    if !supports_id3(path) {
        return Err(TagError::UnsupportedFormat(path.display().to_string()));
    }

    let mut tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => Tag::new(),
        Err(e) => return Err(e.into()),
    };

    if let Some(title) = title {
        tag.set_title(title);
    }
    if let Some(artist) = artist {
        tag.set_artist(artist);
    }
    tag.set_album(ALBUM);
    tag.set_album_artist(ALBUM_ARTIST);
    tag.remove_year();
    tag.remove_date_recorded();
    tag.remove_date_released();
    tag.remove_track();
    tag.remove_total_tracks();

    tag.write_to_path(path, Version::Id3v24)?;
    Ok(())
}
