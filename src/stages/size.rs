//! size-report: measure the output tree.

use std::fs;
use std::path::Path;

use crate::build::{BuildContext, GlobSet, StageError, StageKind, StageReport};

const STAGE: StageKind = StageKind::SizeReport;

const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

/// Human-readable byte count in decimal units, three significant digits.
///
/// `0 B`, `999 B`, `1 kB`, `1.23 kB`, `12.3 kB`, `4.56 MB`
pub fn pretty_bytes(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let digits = if value >= 100.0 {
        format!("{:.0}", value)
    } else if value >= 10.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.2}", value)
    };
    let digits = if digits.contains('.') { digits.trim_end_matches('0').trim_end_matches('.') } else { &digits };
    format!("{} {}", digits, UNITS[unit])
}

/// Size of one output. An unreadable file is noted and left out of the total.
fn file_size(path: &Path, relative: &Path, notes: &mut Vec<String>) -> Option<u64> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.len()),
        Err(e) => {
            let note = format!("{}: cannot read size: {}", relative.display(), e);
            tracing::warn!("{}", note);
            notes.push(note);
            None
        }
    }
}

pub fn run(ctx: &BuildContext) -> Result<StageReport, StageError> {
    let dist = ctx.dist_dir();
    if !dist.is_dir() {
        return Err(StageError::new(STAGE, format!("{} does not exist", dist.display())));
    }

    let files = GlobSet::new(&dist, &["**/*".to_string()]).map_err(|e| StageError::new(STAGE, e.to_string()))?.files();

    let mut report = StageReport::new();
    let mut total = 0u64;
    for file in &files {
        let Some(size) = file_size(&file.path, &file.relative, &mut report.notes) else {
            continue;
        };
        total += size;
        let line = format!("{:>10}  {}", pretty_bytes(size), file.relative.display());
        tracing::debug!("{}", line);
        report.notes.push(line);
        report.inputs.push(file.path.clone());
    }

    let summary = format!("{}: {} in {} file(s)", dist.display(), pretty_bytes(total), files.len());
    tracing::info!("{}", summary);
    report.notes.push(summary);
    Ok(report)
}
