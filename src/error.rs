use ariadne::{Config, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::params::PAD_COUNT;

/// Errors raised outside the render path. The render path itself never
/// fails; it clamps or goes silent.
#[derive(Debug, Error)]
pub enum ChipError {
    #[error("invalid parameter snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("pad index {index} out of range (0..{})", PAD_COUNT)]
    PadIndex { index: usize },
}

impl ChipError {
    /// Render a diagnostic pointing into `source`, the JSON the error came
    /// from. Errors without a location fall back to their `Display` text.
    pub fn report(&self, source: &str) -> String {
        let ChipError::Snapshot(err) = self else {
            return self.to_string();
        };
        let offset = byte_offset(source, err.line(), err.column());
        let span = offset..(offset + 1).min(source.len()).max(offset);

        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, ("snapshot", span.clone()))
            .with_config(Config::default().with_color(false))
            .with_message("invalid parameter snapshot")
            .with_label(Label::new(("snapshot", span)).with_message(err.to_string()))
            .finish()
            .write(("snapshot", Source::from(source)), &mut out);

        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// Convert serde_json's 1-based line / column into a byte offset.
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSnapshot;

    #[test]
    fn offset_from_line_and_column() {
        let src = "{\n  \"mode\": 3\n}";
        assert_eq!(byte_offset(src, 1, 1), 0);
        assert_eq!(byte_offset(src, 2, 3), 4);
        assert_eq!(byte_offset(src, 9, 9), src.len());
    }

    #[test]
    fn report_names_the_problem() {
        let src = "{\n  \"level\": \"loud\"\n}";
        let err = ParameterSnapshot::from_json(src).unwrap_err();
        let report = err.report(src);
        assert!(report.contains("invalid parameter snapshot"), "{report}");
        assert!(report.contains("snapshot"), "{report}");
    }

    #[test]
    fn pad_index_message() {
        let err = ChipError::PadIndex { index: 9 };
        assert_eq!(err.to_string(), "pad index 9 out of range (0..8)");
        assert_eq!(err.report(""), err.to_string());
    }
}
