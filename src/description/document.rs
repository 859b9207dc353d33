use std::path::{Path, PathBuf};
use thiserror::Error;

use super::encoding::{decode_description, DecodeError, TextEncoding};

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// One line of a description document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionLine<'a> {
    /// `#KEY:VALUE`; the key is non-empty and the first `:` splits.
    Header { key: &'a str, value: &'a str },
    /// Lyrics, notes, the `E` end marker, or anything else.
    Text(&'a str),
}

impl<'a> DescriptionLine<'a> {
    pub fn parse(line: &'a str) -> Self {
        line.strip_prefix('#')
            .and_then(|rest| rest.split_once(':'))
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| DescriptionLine::Header { key, value })
            .unwrap_or(DescriptionLine::Text(line))
    }

    pub fn is_header(&self) -> bool {
        matches!(self, DescriptionLine::Header { .. })
    }
}

/// The decoded description document of one song folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongDescription {
    folder: PathBuf,
    path: PathBuf,
    text: String,
    encoding: TextEncoding,
}

impl SongDescription {
    /// Read and decode the document at `path`, belonging to `folder`.
    pub fn load(folder: &Path, path: &Path) -> Result<Self, DescriptionError> {
        let bytes = std::fs::read(path).map_err(|source| DescriptionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (text, encoding) =
            decode_description(&bytes).map_err(|source| DescriptionError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_text(folder, path, text).with_encoding(encoding))
    }

    pub fn from_text(folder: &Path, path: &Path, text: impl Into<String>) -> Self {
        Self {
            folder: folder.to_path_buf(),
            path: path.to_path_buf(),
            text: text.into(),
            encoding: TextEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Encoding the document was read with; write-back uses the same one.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn lines(&self) -> impl Iterator<Item = DescriptionLine<'_>> {
        self.text.lines().map(DescriptionLine::parse)
    }

    /// Value of the first header named `key` (case-insensitive), trimmed.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.lines().find_map(|line| match line {
            DescriptionLine::Header { key: k, value } if k.trim().eq_ignore_ascii_case(key) => {
                Some(value.trim())
            }
            _ => None,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.header("TITLE").filter(|v| !v.is_empty())
    }

    pub fn artist(&self) -> Option<&str> {
        self.header("ARTIST").filter(|v| !v.is_empty())
    }
}
