//! Recovers the video identifier referenced by a description document.
//!
//! Header values are searched first, top to bottom; free-text lines are only
//! searched when no header yields a valid identifier. Within a tier the
//! earliest line wins. Inside that line a valid `a=` audio tag wins, then the
//! earliest position.
//!
//! Candidates are captured greedily over the identifier alphabet and then
//! length-checked, so a run that is too long is rejected as a whole instead
//! of being truncated to a plausible identifier.

use clap::ValueEnum;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::document::DescriptionLine;

/// Length of a video identifier.
pub const VIDEO_ID_LEN: usize = 11;

lazy_static! {
    static ref HOST_MARKER: Regex = Regex::new(
        r"(?i)(?:youtu\.be/|youtube\.com/(?:embed|shorts|v|live)/|youtube-nocookie\.com/embed/)([A-Za-z0-9_-]+)"
    )
    .expect("valid host marker pattern");

    // `v=` introduced by a query/tag separator, whitespace or the start of the value
    static ref QUERY_PARAMETER: Regex =
        Regex::new(r"(?:^|[?&,;\s])v=([A-Za-z0-9_-]+)").expect("valid query pattern");

    // `a=` names a separate audio source in `#VIDEO:v=...,a=...`
    static ref AUDIO_PARAMETER: Regex =
        Regex::new(r"(?:^|[?&,;\s])a=([A-Za-z0-9_-]+)").expect("valid audio tag pattern");

    static ref BARE_TOKEN: Regex = Regex::new(r"[A-Za-z0-9_-]+").expect("valid token pattern");
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no video reference found")]
    NotFound,
}

/// Which pattern family produced a match. Ordered by precedence on ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    AudioParameter,
    HostMarker,
    QueryParameter,
    BareToken,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::AudioParameter => "audio parameter",
            MatchKind::HostMarker => "host marker",
            MatchKind::QueryParameter => "query parameter",
            MatchKind::BareToken => "bare token",
        }
    }
}

/// When identifier-shaped tokens without any URL context are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BareTokenPolicy {
    /// Bare tokens compete by position with contextual matches on every line.
    #[default]
    Anywhere,
    /// Bare tokens are only considered when no line has a contextual match.
    AfterContextual,
    /// Only host-marker, query-parameter and audio-parameter matches are accepted.
    Never,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorOptions {
    pub bare_tokens: BareTokenPolicy,
}

/// A validated video identifier and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub id: String,
    /// Matched substring, including the host marker, `v=` or `a=` when present.
    pub raw: String,
    /// 1-based line number in the document.
    pub line_number: usize,
    pub line: String,
    pub kind: MatchKind,
}

struct Candidate<'a> {
    offset: usize,
    kind: MatchKind,
    id: &'a str,
    raw: &'a str,
}

fn is_valid_id(token: &str) -> bool {
    token.len() == VIDEO_ID_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Best valid candidate in `value` among the allowed kinds: an audio tag,
/// otherwise the earliest.
fn best_in_value<'a>(value: &'a str, kinds: &[MatchKind]) -> Option<Candidate<'a>> {
    let mut candidates = Vec::new();

    if kinds.contains(&MatchKind::HostMarker) {
        for caps in HOST_MARKER.captures_iter(value) {
            let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            candidates.push(Candidate {
                offset: token.start(),
                kind: MatchKind::HostMarker,
                id: token.as_str(),
                raw: &value[whole.start()..token.end()],
            });
        }
    }
    let parameters = [
        (MatchKind::QueryParameter, &*QUERY_PARAMETER),
        (MatchKind::AudioParameter, &*AUDIO_PARAMETER),
    ];
    for (kind, pattern) in parameters {
        if !kinds.contains(&kind) {
            continue;
        }
        for caps in pattern.captures_iter(value) {
            let Some(token) = caps.get(1) else {
                continue;
            };
            // "v=" or "a=" directly precedes the token
            candidates.push(Candidate {
                offset: token.start(),
                kind,
                id: token.as_str(),
                raw: &value[token.start() - 2..token.end()],
            });
        }
    }
    if kinds.contains(&MatchKind::BareToken) {
        for token in BARE_TOKEN.find_iter(value) {
            candidates.push(Candidate {
                offset: token.start(),
                kind: MatchKind::BareToken,
                id: token.as_str(),
                raw: token.as_str(),
            });
        }
    }

    candidates
        .into_iter()
        .filter(|c| is_valid_id(c.id))
        .min_by_key(|c| (c.kind != MatchKind::AudioParameter, c.offset, c.kind))
}

/// Scan headers, then free text, for the first line with a valid candidate.
fn scan(text: &str, kinds: &[MatchKind]) -> Option<VideoReference> {
    let lines: Vec<(usize, &str, DescriptionLine<'_>)> = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line, DescriptionLine::parse(line)))
        .collect();

    let headers = lines.iter().filter_map(|(number, line, parsed)| match parsed {
        DescriptionLine::Header { value, .. } => Some((*number, *line, *value)),
        DescriptionLine::Text(_) => None,
    });
    let free_text = lines.iter().filter_map(|(number, line, parsed)| match parsed {
        DescriptionLine::Text(text) => Some((*number, *line, *text)),
        DescriptionLine::Header { .. } => None,
    });

    headers
        .chain(free_text)
        .find_map(|(line_number, line, value)| {
            best_in_value(value, kinds).map(|c| VideoReference {
                id: c.id.to_string(),
                raw: c.raw.to_string(),
                line_number,
                line: line.to_string(),
                kind: c.kind,
            })
        })
}

/// Find the video identifier referenced by a description document.
pub fn extract(text: &str, options: &ExtractorOptions) -> Result<VideoReference, ExtractionError> {
    const CONTEXTUAL: &[MatchKind] = &[
        MatchKind::AudioParameter,
        MatchKind::HostMarker,
        MatchKind::QueryParameter,
    ];
    const ALL: &[MatchKind] = &[
        MatchKind::AudioParameter,
        MatchKind::HostMarker,
        MatchKind::QueryParameter,
        MatchKind::BareToken,
    ];

    let found = match options.bare_tokens {
        BareTokenPolicy::Anywhere => scan(text, ALL),
        BareTokenPolicy::AfterContextual => {
            scan(text, CONTEXTUAL).or_else(|| scan(text, &[MatchKind::BareToken]))
        }
        BareTokenPolicy::Never => scan(text, CONTEXTUAL),
    };
    found.ok_or(ExtractionError::NotFound)
}
