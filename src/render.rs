//! Report rendering for terminal output.

use owo_colors::OwoColorize;

use crate::analysis::{AnalysisResult, Verdict};
use crate::defaults::AUTHENTIC_THRESHOLD;
use crate::error::{Result, VoxcheckError};

const BAR_WIDTH: usize = 25;
const LABEL_WIDTH: usize = 19;

/// Clear the current terminal line (replaces the recording meter etc.)
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Build a fixed-width meter for a 0-100 score.
///
/// Passing scores fill with solid blocks, failing ones with hatched
/// blocks. The threshold position is marked in the unfilled region.
fn metric_bar(value: u8) -> String {
    let value = value.min(100);
    let filled = value as usize * BAR_WIDTH / 100;
    let threshold_pos = AUTHENTIC_THRESHOLD as usize * BAR_WIDTH / 100;

    (0..BAR_WIDTH)
        .map(|i| {
            if i < filled {
                if value >= AUTHENTIC_THRESHOLD {
                    '█'
                } else {
                    '▓'
                }
            } else if i == threshold_pos {
                '│'
            } else {
                '░'
            }
        })
        .collect()
}

/// One aligned metric row: label, meter, numeric score.
fn metric_row(label: &str, value: u8, color: bool) -> String {
    let padded = format!("{label:<width$}", width = LABEL_WIDTH);
    let bar = metric_bar(value);
    if color {
        format!("  {}  [{bar}] {value:>3}", padded.dimmed())
    } else {
        format!("  {padded}  [{bar}] {value:>3}")
    }
}

fn verdict_line(verdict: Verdict, color: bool) -> String {
    if !color {
        return format!("Verdict: {verdict}");
    }
    match verdict {
        Verdict::Authentic => format!("Verdict: {}", "authentic".green()),
        Verdict::Synthetic => format!("Verdict: {}", "synthetic".red()),
    }
}

/// Render a finished analysis as metric rows plus a verdict line.
pub fn format_report(result: &AnalysisResult, color: bool) -> String {
    let m = &result.metrics;
    [
        metric_row("Authentication rate", m.authentication_rate, color),
        metric_row("Naturalness", m.naturalness, color),
        metric_row("Stability", m.stability, color),
        String::new(),
        verdict_line(result.verdict, color),
    ]
    .join("\n")
}

/// Render a finished analysis as a single JSON line.
pub fn format_report_json(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string(result)
        .map_err(|e| VoxcheckError::Other(format!("Failed to encode report as JSON: {e}")))
}
