//! Song library trees in temporary directories

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Description with title/artist headers, a YouTube URL comment and a few notes.
pub fn description_with_url(video_id: &str) -> String {
    format!(
        "#TITLE:Song\n#ARTIST:Band\n#BPM:300\n#GAP:1200\n#VIDEO:v={id}\n\
         : 0 4 60 Hel\n: 5 4 62 lo\n- 12\n: 14 6 64 world\n\
         E\n\
         source: https://www.youtube.com/watch?v={id}\n",
        id = video_id
    )
}

/// Temporary library root with one subdirectory per song.
pub struct SongLibrary {
    dir: TempDir,
}

impl SongLibrary {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn folder(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create `<root>/<name>/<name>.txt` with `description`.
    pub fn add_song(&self, name: &str, description: &str) -> PathBuf {
        let folder = self.folder(name);
        fs::create_dir_all(&folder).expect("Failed to create song folder");
        fs::write(folder.join(format!("{}.txt", name)), description)
            .expect("Failed to write description");
        folder
    }

    /// Write an extra file into an existing song folder.
    pub fn add_file(&self, song: &str, file_name: &str, content: &[u8]) -> PathBuf {
        let path = self.folder(song).join(file_name);
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn read_description(&self, name: &str) -> String {
        fs::read_to_string(self.folder(name).join(format!("{}.txt", name)))
            .expect("Failed to read description")
    }

    /// Non-hidden file names in a song folder, sorted.
    pub fn files(&self, song: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.folder(song))
            .expect("Failed to read song folder")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// Hidden entries (staging leftovers) in a song folder.
    pub fn hidden_entries(&self, song: &str) -> Vec<String> {
        fs::read_dir(self.folder(song))
            .expect("Failed to read song folder")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('.'))
            .collect()
    }
}
