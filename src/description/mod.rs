//! UltraStar song description documents: decoding, parsing, reference
//! extraction and header write-back.

mod document;
mod encoding;
mod extractor;
mod writer;

pub use document::{DescriptionError, DescriptionLine, SongDescription};
pub use encoding::{decode_description, encode_description, DecodeError, EncodeError, TextEncoding};
pub use extractor::{
    extract, BareTokenPolicy, ExtractionError, ExtractorOptions, MatchKind, VideoReference,
    VIDEO_ID_LEN,
};
pub use writer::{
    file_name, set_header, set_mp3_header, update_headers, update_mp3_header, BACKGROUND_KEY,
    COVER_KEY, MP3_KEY,
};

/// Extension of description documents.
pub const DESCRIPTION_EXTENSION: &str = "txt";
