//! Write-back of the headers that point the game at the song's files.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

use super::document::{DescriptionLine, SongDescription};
use super::encoding::{encode_description, TextEncoding};

pub const MP3_KEY: &str = "MP3";
pub const COVER_KEY: &str = "COVER";
pub const BACKGROUND_KEY: &str = "BACKGROUND";
const ENCODING_KEY: &str = "ENCODING";

/// Return `text` with its `#<key>` header set to `value`.
///
/// An existing header keeps its key spelling and position; a missing one is
/// inserted after the last header line. All other lines are kept verbatim,
/// including their line endings.
pub fn set_header(text: &str, key: &str, value: &str) -> String {
    let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();

    let mut last_header = None;
    for index in 0..lines.len() {
        let content = lines[index].trim_end_matches(['\r', '\n']);
        if let DescriptionLine::Header { key: existing, .. } = DescriptionLine::parse(content) {
            if existing.trim().eq_ignore_ascii_case(key) {
                let ending = &lines[index][content.len()..];
                let replaced = format!("#{}:{}{}", existing, value, ending);
                lines[index] = replaced;
                return lines.concat();
            }
            last_header = Some(index);
        }
    }

    let insert_at = match last_header {
        Some(index) => {
            if !lines[index].ends_with('\n') {
                lines[index].push_str(newline);
            }
            index + 1
        }
        None => 0,
    };
    lines.insert(insert_at, format!("#{}:{}{}", key, value, newline));
    lines.concat()
}

/// Return `text` with its `#MP3` header pointing at `file_name`.
pub fn set_mp3_header(text: &str, file_name: &str) -> String {
    set_header(text, MP3_KEY, file_name)
}

/// Set every `(key, value)` header of the description and rewrite the file.
///
/// Returns `Ok(false)` when all headers already had their value. The file is
/// replaced atomically through a temporary sibling, keeping its encoding and
/// permissions.
pub fn update_headers(description: &SongDescription, headers: &[(&str, &str)]) -> io::Result<bool> {
    let pending: Vec<_> = headers
        .iter()
        .filter(|(key, value)| description.header(key) != Some(*value))
        .collect();
    if pending.is_empty() {
        return Ok(false);
    }

    let updated = pending
        .iter()
        .fold(description.text().to_string(), |text, (key, value)| {
            set_header(&text, key, value)
        });
    let bytes = encode_for_write(description, updated);
    write_atomically(description.path(), &bytes)?;
    Ok(true)
}

/// Point the description's `#MP3` header at `audio_path`.
pub fn update_mp3_header(description: &SongDescription, audio_path: &Path) -> io::Result<bool> {
    update_headers(description, &[(MP3_KEY, file_name(audio_path)?)])
}

/// Final path component as UTF-8, the form headers refer to files by.
pub fn file_name(path: &Path) -> io::Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no UTF-8 file name", path.display()),
            )
        })
}

/// Encode in the source encoding, switching to UTF-8 when a new value does
/// not fit Windows-1252.
fn encode_for_write(description: &SongDescription, text: String) -> Vec<u8> {
    match encode_description(&text, description.encoding()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                "{}: {}, writing UTF-8 instead",
                description.path().display(),
                e
            );
            let declares_encoding = text.lines().any(|line| {
                matches!(DescriptionLine::parse(line), DescriptionLine::Header { key, .. }
                    if key.trim().eq_ignore_ascii_case(ENCODING_KEY))
            });
            let text = if declares_encoding {
                set_header(&text, ENCODING_KEY, TextEncoding::Utf8.header_value())
            } else {
                text
            };
            text.into_bytes()
        }
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path)?.permissions();
    let mut file = tempfile::Builder::new()
        .prefix(".usdx-fetch-")
        .suffix(".txt")
        .tempfile_in(parent)?;
    file.write_all(contents)?;
    // temporary files are created owner-only
    file.as_file().set_permissions(permissions)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
