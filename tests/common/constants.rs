//! Fixed test data

pub const VIDEO_ID_1: &str = "dQw4w9WgXcQ";
pub const VIDEO_ID_2: &str = "9bZkp7q5f_E";
pub const VIDEO_ID_3: &str = "kJQP7kiw5Fk";

/// A single MPEG audio frame header, enough for ID3 tagging.
pub const MP3_BYTES: &[u8] = &[0xFF, 0xFB, 0x90, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Bytes the fake loudness tool appends to a file it "normalizes".
pub const LOUDNESS_MARKER: &[u8] = b"REPLAYGAIN";
