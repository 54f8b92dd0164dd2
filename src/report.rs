use std::fmt::Write as _;
use std::path::Path;

use crate::classify::{classify, Report, Run};
use crate::error::Result;
use crate::storage;

/// Report line for one run, e.g. `Frame 12-47: multiple faces not detected`.
pub fn run_line(run: &Run) -> String {
    format!(
        "Frame {}-{}: {}",
        run.interval.start(),
        run.interval.end(),
        run.category
    )
}

/// Renders the full text report. The last line has no trailing newline.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    for run in report.runs() {
        out.push_str(&run_line(run));
        out.push('\n');
    }
    let _ = write!(
        out,
        "\nMismatch in {} out of {} frames.\nAccuracy: {}",
        report.mismatch_count(),
        report.total_frames(),
        format_ratio(report.accuracy())
    );
    out
}

/// Shortest round-trip form of `ratio`: `1.0`, `0.5`, `0.0001`, `5e-05`.
///
/// Nonzero values below 1e-4 use exponent notation with a two-digit
/// exponent; everything else is a plain decimal with a fractional digit.
pub fn format_ratio(ratio: f64) -> String {
    if ratio != 0.0 && ratio.abs() < 1e-4 {
        let s = format!("{ratio:e}");
        return match s.split_once("e-") {
            Some((mantissa, exp)) if exp.len() < 2 => format!("{mantissa}e-0{exp}"),
            _ => s,
        };
    }
    let s = format!("{ratio}");
    if s.contains('.') {
        s
    } else {
        format!("{s}.0")
    }
}

/// Replaces the contents of `path` with the rendered report.
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render(report))?;
    Ok(())
}

/// Compares two stored codings and writes the report to `output`.
///
/// `output` is left untouched when loading or classification fails.
pub fn compare_files(detected: &Path, actual: &Path, output: &Path) -> Result<Report> {
    let detected = storage::load_sequence(detected)?;
    let actual = storage::load_sequence(actual)?;
    let report = classify(&detected, &actual)?;
    write_report(&report, output)?;
    Ok(report)
}
