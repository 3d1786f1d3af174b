//! Human-readable end-of-run summary.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::mirror::SyncSummary;

/// Lines describing a finished run, without styling.
///
/// The first line is always present; the others only when their count is
/// non-zero.
#[must_use]
pub fn summary_lines(summary: &SyncSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Backup finished successfully, {} files in {} directories up-to-date.",
        summary.files_up_to_date, summary.dirs_up_to_date
    )];

    if summary.files_updated > 0 {
        lines.push(format!(
            "Updated {} files ({}).",
            summary.files_updated,
            ByteSize::b(summary.bytes_copied)
        ));
    }
    if summary.files_archived > 0 {
        lines.push(format!("Archived {} files.", summary.files_archived));
    }
    if summary.files_deduplicated > 0 {
        lines.push(format!("Deduplicated {} files.", summary.files_deduplicated));
    }
    if summary.files_skipped > 0 {
        lines.push(format!("Skipped {} unreadable files.", summary.files_skipped));
    }
    lines
}

/// Print the summary, highlighting the first line.
///
/// # Errors
///
/// Returns an error if `out` cannot be written.
pub fn print_summary(out: &mut impl Write, summary: &SyncSummary) -> io::Result<()> {
    let mut lines = summary_lines(summary).into_iter();
    if let Some(headline) = lines.next() {
        writeln!(out, "{}", headline.green().bold())?;
    }
    for line in lines {
        let styled = if line.starts_with("Skipped") {
            line.yellow()
        } else {
            line.primary()
        };
        writeln!(out, "{styled}")?;
    }
    Ok(())
}
