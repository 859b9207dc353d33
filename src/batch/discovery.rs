//! Song folder discovery under the library root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::media::is_audio_path;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("root directory {} does not exist", path.display())]
    RootMissing { path: PathBuf },

    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Immediate, non-hidden subdirectories of `root`, sorted by name.
pub fn list_song_folders(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootMissing {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let unreadable = |source: io::Error| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        source,
    };
    let mut folders = Vec::new();
    for entry in fs::read_dir(root).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_dir() && !is_hidden(&path) {
            folders.push(path);
        }
    }
    folders.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(folders)
}

/// Files of interest in one song folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderContents {
    pub descriptions: Vec<PathBuf>,
    pub audio_files: Vec<PathBuf>,
    /// `.jpg` images, candidates for the cover and background.
    pub images: Vec<PathBuf>,
}

const IMAGE_EXTENSION: &str = "jpg";

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// List description documents, audio files and images in `folder`. Hidden files are ignored.
pub fn inspect_folder(folder: &Path, description_extension: &str) -> io::Result<FolderContents> {
    let mut contents = FolderContents::default();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() || is_hidden(&path) {
            continue;
        }
        if has_extension(&path, description_extension) {
            contents.descriptions.push(path);
        } else if is_audio_path(&path) {
            contents.audio_files.push(path);
        } else if has_extension(&path, IMAGE_EXTENSION) {
            contents.images.push(path);
        }
    }
    contents.descriptions.sort();
    contents.audio_files.sort();
    contents.images.sort();
    Ok(contents)
}
