//! Console rendering of a validation report
//!
//! Each view is printed as a column-major table of `index -> value` cells.
//! Bytes in the SNORM upper half also show their two's-complement value, and
//! failing cells are marked with `*`.

use std::fmt;
use texel_alias::format::DecodeSemantic;
use texel_alias::{AliasKind, TexelRecord, ValidationReport, ViewReport};

/// Columns used when none are requested
pub const DEFAULT_COLUMNS: usize = 4;

/// Displays a report as text tables
#[derive(Debug, Clone, Copy)]
pub struct ReportTable<'a> {
    report: &'a ValidationReport,
    columns: usize,
}

impl<'a> ReportTable<'a> {
    /// Creates a renderer laying each view out over `columns` columns
    pub fn new(report: &'a ValidationReport, columns: usize) -> Self {
        Self {
            report,
            columns: columns.max(1),
        }
    }
}

fn cell_label(record: &TexelRecord) -> String {
    if record.semantic == DecodeSemantic::Snorm && record.raw_byte >= 128 {
        format!("{} ({})", record.index, record.interpreted)
    } else {
        record.index.to_string()
    }
}

fn cell(record: &TexelRecord) -> String {
    let flag = if record.passed { ' ' } else { '*' };
    format!("{:>10} -> {:>9.6}{flag}", cell_label(record), record.actual)
}

impl ReportTable<'_> {
    fn fmt_view(&self, f: &mut fmt::Formatter<'_>, view: &ViewReport) -> fmt::Result {
        write!(f, "{} ({}, {}, tolerance {}", view.name, view.format, view.semantic, view.tolerance)?;
        // A copied view says nothing about reinterpreting the store
        if view.alias == AliasKind::Materialized {
            write!(f, ", materialized copy")?;
        }
        writeln!(f, ")")?;

        let rows = view.records.len().div_ceil(self.columns);
        for row in 0..rows {
            let line: Vec<String> = (0..self.columns)
                .filter_map(|column| view.records.get(column * rows + row))
                .map(cell)
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())?;
        }

        if view.mismatches > 0 {
            writeln!(f, "{} mismatches:", view.mismatches)?;
            for record in view.mismatched() {
                writeln!(
                    f,
                    "  [{}] byte {} ({}): expected {:.6}, got {:.6}, delta {:.6}",
                    record.index, record.raw_byte, record.interpreted, record.expected, record.actual, record.delta
                )?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ReportTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for view in &self.report.views {
            self.fmt_view(f, view)?;
            writeln!(f)?;
        }

        let summary = &self.report.summary;
        let status = if self.report.is_clean() { "PASS" } else { "FAIL" };
        writeln!(
            f,
            "{status}: {} views, {} texels checked, {} mismatches",
            summary.views, summary.texels_checked, summary.mismatches
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texel_alias::format::DecodeRule;
    use texel_alias::validator::ReportSummary;
    use texel_alias::{TexelFormat, TexelStore};

    fn report(semantic: DecodeSemantic, format: TexelFormat, corrupt: Option<usize>) -> ValidationReport {
        let store = TexelStore::generate(4);
        let mut actual: Vec<f32> = (0..=255u8).map(|b| semantic.expected(b)).collect();
        if let Some(index) = corrupt {
            actual[index] = 0.75;
        }
        let view = ViewReport::evaluate(format.name(), format, &DecodeRule::new(semantic), &store, &actual);
        let summary = ReportSummary {
            views: 1,
            texels_checked: view.records.len(),
            mismatches: view.mismatches,
        };
        ValidationReport { views: vec![view], summary }
    }

    #[test]
    fn test_column_major_layout() {
        let report = report(DecodeSemantic::Unorm, TexelFormat::Rgba8Unorm, None);
        let text = ReportTable::new(&report, 4).to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("rgba8unorm (rgba8unorm, UNORM"));
        assert!(lines[0].ends_with(')') && !lines[0].contains("materialized"));
        // 256 texels over 4 columns: the first row holds 0, 64, 128 and 192
        let first_row: Vec<&str> = lines[1].split("->").map(str::trim).collect();
        assert_eq!(first_row[0], "0");
        assert!(first_row[1].starts_with("0.000000") && first_row[1].ends_with("64"));
        assert!(first_row[2].ends_with("128"));
        assert!(first_row[3].ends_with("192"));
        assert_eq!(lines.iter().filter(|line| line.contains("->")).count(), 64);
        assert_eq!(lines.last(), Some(&"PASS: 1 views, 256 texels checked, 0 mismatches"));
    }

    #[test]
    fn test_snorm_upper_half_shows_signed_value() {
        let report = report(DecodeSemantic::Snorm, TexelFormat::Rgba8Snorm, None);
        let text = ReportTable::new(&report, 2).to_string();

        assert!(text.contains("128 (-128) -> -1.000000"));
        assert!(text.contains("255 (-1) -> -0.007874"));
        assert!(text.contains("       127 ->  1.000000"));
    }

    #[test]
    fn test_failures_are_flagged() {
        let report = report(DecodeSemantic::Srgb, TexelFormat::Rgba8UnormSrgb, Some(7));
        let text = ReportTable::new(&report, 0).to_string();

        assert!(text.contains("         7 ->  0.750000*"));
        assert!(text.contains("1 mismatches:"));
        assert!(text.contains("  [7] byte 7 (7): expected 0.002125, got 0.750000"));
        assert!(text.trim_end().ends_with("FAIL: 1 views, 256 texels checked, 1 mismatches"));
    }

    #[test]
    fn test_materialized_view_is_marked() {
        let mut report = report(DecodeSemantic::Snorm, TexelFormat::Rgba8Snorm, None);
        report.views[0].alias = AliasKind::Materialized;
        let text = ReportTable::new(&report, 4).to_string();

        assert_eq!(text.lines().next(), Some("rgba8snorm (rgba8snorm, SNORM, tolerance 0.0001, materialized copy)"));
    }
}
