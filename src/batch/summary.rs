//! End-of-run summary.

use crossterm::style::{Color, Stylize};
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use super::outcome::{SongOutcome, SongStatus, StageReport};
use crate::cli_style::{box_chars, colors, print_section_footer, print_section_header};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub skipped: usize,
    pub downloaded: usize,
    pub tagged: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_outcomes(outcomes: &[SongOutcome]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.status() {
                SongStatus::Skipped => counts.skipped += 1,
                SongStatus::Downloaded => counts.downloaded += 1,
                SongStatus::Tagged => counts.tagged += 1,
                SongStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.skipped + self.downloaded + self.tagged + self.failed
    }
}

pub fn has_failures(outcomes: &[SongOutcome]) -> bool {
    outcomes.iter().any(|o| o.status().is_failure())
}

/// Process exit code for a finished run: 1 if any song failed.
pub fn exit_code(outcomes: &[SongOutcome]) -> u8 {
    if has_failures(outcomes) {
        1
    } else {
        0
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Main detail of a song line: skip reason, artifact or failure diagnostic.
fn detail(outcome: &SongOutcome) -> String {
    if let Some(failure) = outcome.failure() {
        let mut text = format!("{}: {}", failure.category(), failure.diagnostic());
        if let Some(reference) = outcome.reference() {
            text.push_str(&format!(
                " [line {}: {}]",
                reference.line_number, reference.raw
            ));
        }
        return text;
    }
    if let Some(reason) = outcome.skip_reason() {
        return reason.to_string();
    }
    match (outcome.reference(), outcome.audio()) {
        (Some(reference), Some(audio)) => {
            let file_name = audio
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match audio.duration {
                Some(duration) => format!(
                    "{} -> {} ({})",
                    reference.id,
                    file_name,
                    format_duration(duration)
                ),
                None => format!("{} -> {}", reference.id, file_name),
            }
        }
        _ => String::new(),
    }
}

/// Failed optional stages, as `(stage, reason)`.
fn stage_notes(outcome: &SongOutcome) -> Vec<(&'static str, &str)> {
    [
        ("normalization", outcome.normalization()),
        ("id3 tags", outcome.id3_tags()),
        ("description update", outcome.description_update()),
        ("cover", outcome.cover()),
        ("permissions", outcome.permissions()),
    ]
    .into_iter()
    .filter_map(|(stage, report)| match report {
        StageReport::Failed(reason) => Some((stage, reason.as_str())),
        _ => None,
    })
    .collect()
}

fn totals_line(counts: &StatusCounts) -> String {
    format!(
        "{} songs: {} tagged, {} downloaded, {} skipped, {} failed",
        counts.total(),
        counts.tagged,
        counts.downloaded,
        counts.skipped,
        counts.failed
    )
}

/// Plain-text summary, one line per song followed by the totals.
pub fn render_summary(outcomes: &[SongOutcome]) -> String {
    let name_width = outcomes
        .iter()
        .map(|o| o.name().width())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for outcome in outcomes {
        let name = outcome.name();
        let padding = " ".repeat(name_width - name.width());
        out.push_str(&format!(
            "{:<10} {}{}  {}\n",
            outcome.status().as_str(),
            name,
            padding,
            detail(outcome)
        ));
        for (stage, reason) in stage_notes(outcome) {
            out.push_str(&format!("{:<10} {} failed: {}\n", "", stage, reason));
        }
    }
    out.push_str(&totals_line(&StatusCounts::from_outcomes(outcomes)));
    out.push('\n');
    out
}

fn status_color(status: SongStatus) -> Color {
    match status {
        SongStatus::Skipped => colors::DIM,
        SongStatus::Downloaded => colors::CYAN,
        SongStatus::Tagged => colors::GREEN,
        SongStatus::Failed => colors::RED,
    }
}

fn status_mark(status: SongStatus) -> &'static str {
    match status {
        SongStatus::Skipped => box_chars::BULLET_EMPTY,
        SongStatus::Downloaded => box_chars::BULLET,
        SongStatus::Tagged => box_chars::CHECK,
        SongStatus::Failed => box_chars::CROSS_MARK,
    }
}

/// Colored summary on stdout.
pub fn print_summary(outcomes: &[SongOutcome]) {
    print_section_header("Summary");
    if outcomes.is_empty() {
        println!("  {}", "no song folders processed".with(colors::DIM));
    }
    for outcome in outcomes {
        let status = outcome.status();
        let color = status_color(status);
        println!(
            "  {} {} {}  {}",
            status_mark(status).with(color).bold(),
            format!("{:<10}", status.as_str()).with(color),
            outcome.name().with(colors::WHITE).bold(),
            detail(outcome).with(colors::DIM)
        );
        for (stage, reason) in stage_notes(outcome) {
            println!(
                "      {} {}",
                format!("{} failed:", stage).with(colors::ORANGE),
                reason.with(colors::ORANGE)
            );
        }
    }
    let counts = StatusCounts::from_outcomes(outcomes);
    let totals_color = if counts.failed > 0 {
        colors::RED
    } else {
        colors::GREEN
    };
    println!();
    println!("  {}", totals_line(&counts).with(totals_color).bold());
    print_section_footer();
}
