//! Text rendering for the run. Everything here is a pure function of its
//! input; printing is left to the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use humansize::{DECIMAL, format_size};

use crate::cli::EncodeOptions;
use crate::converter::ConversionTask;
use crate::pool::ConversionOutcome;

/// Percentage saved going from `orig` to `conv` bytes. Negative when the
/// output grew.
pub fn reduction_percent(orig: u64, conv: u64) -> f64 {
    if orig == 0 {
        return 0.0;
    }
    (1.0 - conv as f64 / orig as f64) * 100.0
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn found_types(counts: &BTreeMap<String, usize>) -> Vec<String> {
    std::iter::once("=== Found file types ===".to_string())
        .chain(counts.iter().map(|(ext, n)| format!("{ext}: {n}")))
        .collect()
}

pub fn run_header(count: usize, format: &str, options: &EncodeOptions, workers: usize) -> String {
    format!(
        "Converting {count} .{format} files to WebP ({}, workers={workers})",
        options.describe()
    )
}

pub fn dry_run_line(task: &ConversionTask) -> String {
    format!(
        "{} -> {} ({})",
        task.source.display(),
        task.destination.display(),
        format_size(task.source_size, DECIMAL)
    )
}

/// One line per finished file.
pub fn status_line(outcome: &ConversionOutcome) -> String {
    let task = &outcome.task;
    match &outcome.result {
        Ok(c) => format!(
            "OK: {} -> {} ({} -> {}, {:.1}% reduction)",
            file_name(&task.source),
            file_name(&task.destination),
            format_size(c.original_size, DECIMAL),
            format_size(c.converted_size, DECIMAL),
            reduction_percent(c.original_size, c.converted_size)
        ),
        Err(e) => format!("FAIL: {} -> {e}", task.source.display()),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
    /// Totals over successful files only.
    pub original_bytes: u64,
    pub converted_bytes: u64,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[ConversionOutcome]) -> Self {
        outcomes.iter().fold(Summary::default(), |mut s, o| {
            match &o.result {
                Ok(c) => {
                    s.succeeded += 1;
                    s.original_bytes += c.original_size;
                    s.converted_bytes += c.converted_size;
                }
                Err(_) => s.failed += 1,
            }
            s
        })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn reduction(&self) -> f64 {
        reduction_percent(self.original_bytes, self.converted_bytes)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Summary: {} successful, {} failed", self.succeeded, self.failed)?;
        if self.succeeded > 0 && self.original_bytes > 0 {
            write!(
                f,
                "\nTotal size: {} -> {} ({:.1}% reduction)",
                format_size(self.original_bytes, DECIMAL),
                format_size(self.converted_bytes, DECIMAL),
                self.reduction()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::Converted;
    use crate::error::ConvertError;
    use std::path::PathBuf;

    const OPTIONS: EncodeOptions = EncodeOptions { quality: 80, lossless: false, method: 4 };

    fn outcome(name: &str, result: Result<(u64, u64), ConvertError>) -> ConversionOutcome {
        ConversionOutcome {
            task: ConversionTask {
                source: PathBuf::from(format!("/in/{name}.jpg")),
                destination: PathBuf::from(format!("/out/{name}.webp")),
                ext: "jpg".into(),
                source_size: 2_000_000,
                options: OPTIONS,
            },
            result: result.map(|(original_size, converted_size)| Converted {
                original_size,
                converted_size,
            }),
        }
    }

    #[test]
    fn reduction_math() {
        assert_eq!(reduction_percent(0, 10), 0.0);
        assert_eq!(reduction_percent(200, 50), 75.0);
        assert_eq!(reduction_percent(100, 100), 0.0);
        assert!(reduction_percent(100, 150) < 0.0);
    }

    #[test]
    fn ok_line_shows_names_sizes_and_percent() {
        let line = status_line(&outcome("IMG_1", Ok((2_000_000, 500_000))));
        assert_eq!(line, "OK: IMG_1.jpg -> IMG_1.webp (2 MB -> 500 kB, 75.0% reduction)");
    }

    #[test]
    fn fail_line_carries_error() {
        let line = status_line(&outcome("bad", Err(ConvertError::Unsupported("heic".into()))));
        assert_eq!(line, "FAIL: /in/bad.jpg -> no decoder for .heic files");
    }

    #[test]
    fn summary_counts_match_outcomes() {
        let outcomes = vec![
            outcome("a", Ok((1_000, 400))),
            outcome("b", Ok((3_000, 600))),
            outcome("c", Err(ConvertError::EmptyOutput)),
        ];
        let summary = Summary::from_outcomes(&outcomes);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), outcomes.len());
        assert_eq!(summary.original_bytes, 4_000);
        assert_eq!(summary.converted_bytes, 1_000);
        assert_eq!(summary.reduction(), 75.0);
        assert_eq!(
            summary.to_string(),
            "Summary: 2 successful, 1 failed\nTotal size: 4 kB -> 1 kB (75.0% reduction)"
        );
    }

    #[test]
    fn summary_without_successes_has_no_totals() {
        let summary = Summary::from_outcomes(&[outcome("x", Err(ConvertError::EmptyOutput))]);
        assert_eq!(summary.to_string(), "Summary: 0 successful, 1 failed");
    }

    #[test]
    fn listing_and_header() {
        let mut counts = BTreeMap::new();
        counts.insert("png".to_string(), 2);
        counts.insert("jpg".to_string(), 3);
        assert_eq!(found_types(&counts), vec!["=== Found file types ===", "jpg: 3", "png: 2"]);
        assert_eq!(
            run_header(3, "jpg", &OPTIONS, 4),
            "Converting 3 .jpg files to WebP (quality=80, method=4, workers=4)"
        );
    }

    #[test]
    fn dry_run_line_shows_plan() {
        let o = outcome("p", Ok((1, 1)));
        assert_eq!(dry_run_line(&o.task), "/in/p.jpg -> /out/p.webp (2 MB)");
    }
}
