//! Decoding and re-encoding of description files.
//!
//! Files are UTF-8 (optionally with a byte order mark). Older files are often
//! Windows-1252, which is used as a fallback when the bytes are not UTF-8.
//! Rewritten files keep the encoding they were read with.

use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("byte 0x{byte:02X} at offset {offset} is neither UTF-8 nor Windows-1252")]
    UndefinedByte { byte: u8, offset: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{ch:?} cannot be written as Windows-1252")]
    Unrepresentable { ch: char },
}

/// Byte encoding a description file was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf8WithBom,
    Cp1252,
}

impl TextEncoding {
    /// Value of the `#ENCODING` header matching this encoding.
    pub fn header_value(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8WithBom => "UTF8",
            TextEncoding::Cp1252 => "CP1252",
        }
    }
}

/// Windows-1252 code points for 0x80..=0x9F; `None` marks undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Decode the raw bytes of a description file, reporting the encoding used.
pub fn decode_description(bytes: &[u8]) -> Result<(String, TextEncoding), DecodeError> {
    let (bytes, encoding) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, TextEncoding::Utf8WithBom),
        None => (bytes, TextEncoding::Utf8),
    };
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((text.to_string(), encoding)),
        Err(_) => decode_cp1252(bytes).map(|text| (text, TextEncoding::Cp1252)),
    }
}

/// Encode `text` as bytes in `encoding`.
pub fn encode_description(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, EncodeError> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Utf8WithBom => {
            let mut bytes = Vec::with_capacity(UTF8_BOM.len() + text.len());
            bytes.extend_from_slice(UTF8_BOM);
            bytes.extend_from_slice(text.as_bytes());
            Ok(bytes)
        }
        TextEncoding::Cp1252 => text.chars().map(encode_cp1252_char).collect(),
    }
}

fn decode_cp1252(bytes: &[u8]) -> Result<String, DecodeError> {
    bytes
        .iter()
        .enumerate()
        .map(|(offset, &byte)| match byte {
            0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)]
                .ok_or(DecodeError::UndefinedByte { byte, offset }),
            // ASCII and 0xA0..=0xFF map to the same code points as Latin-1
            _ => Ok(char::from(byte)),
        })
        .collect()
}

fn encode_cp1252_char(ch: char) -> Result<u8, EncodeError> {
    match u32::from(ch) {
        code @ (0x00..=0x7F | 0xA0..=0xFF) => Ok(code as u8),
        _ => CP1252_HIGH
            .iter()
            .position(|mapped| *mapped == Some(ch))
            .map(|index| 0x80 + index as u8)
            .ok_or(EncodeError::Unrepresentable { ch }),
    }
}
