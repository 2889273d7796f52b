//! Result validation and the aggregate report
//!
//! Every texel of every view is recorded, pass or fail. Mismatches never stop
//! the comparison; they are counted per view and summarized once all views ran.

use crate::dataset::TexelStore;
use crate::device::AliasKind;
use crate::format::{DecodeRule, DecodeSemantic, TexelFormat};
use crate::registry::ViewDescriptor;
use serde::Serialize;

/// Outcome of comparing one decoded texel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TexelRecord {
    /// Texel index, identical across store, view, result buffer and report
    pub index: usize,
    /// Name of the view the texel was decoded through
    pub view: String,
    /// Decode semantic of the view
    pub semantic: DecodeSemantic,
    /// Stored byte
    pub raw_byte: u8,
    /// Integer value the byte was interpreted as before normalization
    pub interpreted: i16,
    /// Analytically expected value
    pub expected: f32,
    /// Value read back from the device (NaN if the device produced none)
    pub actual: f32,
    /// `|actual - expected|`
    pub delta: f32,
    /// Whether `delta` is within the view's tolerance
    pub passed: bool,
}

/// All records of one view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewReport {
    /// Name of the view
    pub name: String,
    /// Format of the view
    pub format: TexelFormat,
    /// Decode semantic of the view
    pub semantic: DecodeSemantic,
    /// Whether the view reinterpreted the store or a device-side copy of it
    pub alias: AliasKind,
    /// Tolerance the records were checked against
    pub tolerance: f32,
    /// One record per texel index, in index order
    pub records: Vec<TexelRecord>,
    /// Number of failed records
    pub mismatches: usize,
}

impl ViewReport {
    /// Compares device output for one view against its decode rule
    ///
    /// `actual[i]` is the decoded value of texel `i`; indices the slice does not
    /// cover are recorded as failures with a NaN actual value.
    pub fn evaluate(name: &str, format: TexelFormat, rule: &DecodeRule, store: &TexelStore, actual: &[f32]) -> Self {
        let records: Vec<TexelRecord> = store
            .texels()
            .enumerate()
            .map(|(index, raw_byte)| {
                let expected = rule.expected(raw_byte);
                let actual = actual.get(index).copied().unwrap_or(f32::NAN);
                let delta = (actual - expected).abs();
                // NaN deltas compare false and fail
                let passed = delta <= rule.tolerance;
                if !passed {
                    tracing::debug!(view = name, index, raw_byte, expected, actual, delta, "texel mismatch");
                }
                TexelRecord {
                    index,
                    view: name.to_string(),
                    semantic: rule.semantic,
                    raw_byte,
                    interpreted: rule.interpret(raw_byte),
                    expected,
                    actual,
                    delta,
                    passed,
                }
            })
            .collect();
        let mismatches = records.iter().filter(|record| !record.passed).count();

        Self {
            name: name.to_string(),
            format,
            semantic: rule.semantic,
            alias: AliasKind::Reinterpreted,
            tolerance: rule.tolerance,
            records,
            mismatches,
        }
    }

    /// Records how the device produced the view
    pub fn with_alias(mut self, alias: AliasKind) -> Self {
        self.alias = alias;
        self
    }

    /// Record of texel `index`
    pub fn record(&self, index: usize) -> Option<&TexelRecord> {
        self.records.get(index)
    }

    /// Failed records, in index order
    pub fn mismatched(&self) -> impl Iterator<Item = &TexelRecord> {
        self.records.iter().filter(|record| !record.passed)
    }
}

/// Aggregate counts over all views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Number of views processed
    pub views: usize,
    /// Total texel records
    pub texels_checked: usize,
    /// Total failed records
    pub mismatches: usize,
}

/// Finalized report of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Per-view reports in processing order
    pub views: Vec<ViewReport>,
    /// Aggregate counts
    pub summary: ReportSummary,
}

impl ValidationReport {
    /// Report of the view named `name`
    pub fn view(&self, name: &str) -> Option<&ViewReport> {
        self.views.iter().find(|view| view.name == name)
    }

    /// Record of texel `index` decoded through view `name`
    pub fn record(&self, name: &str, index: usize) -> Option<&TexelRecord> {
        self.view(name).and_then(|view| view.record(index))
    }

    /// Records of texel `index` across all views
    pub fn records_at(&self, index: usize) -> impl Iterator<Item = &TexelRecord> {
        self.views.iter().filter_map(move |view| view.record(index))
    }

    /// All failed records, view by view
    pub fn mismatches(&self) -> impl Iterator<Item = &TexelRecord> {
        self.views.iter().flat_map(|view| view.mismatched())
    }

    /// Returns true if every texel of every view passed
    pub fn is_clean(&self) -> bool {
        self.summary.mismatches == 0
    }

    /// Serializes the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Accumulates per-view comparisons into a report
#[derive(Debug, Default)]
pub struct ResultValidator {
    views: Vec<ViewReport>,
}

impl ResultValidator {
    /// Creates an empty validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares the read-back values of one view and records every texel
    ///
    /// Returns the number of mismatches of this view.
    pub fn compare<V>(&mut self, view: &ViewDescriptor<'_, V>, actual: &[f32]) -> usize {
        let report = ViewReport::evaluate(view.name(), view.format(), view.rule(), view.store(), actual).with_alias(view.alias());

        if report.mismatches == 0 {
            tracing::info!(view = %report.name, semantic = %report.semantic, texels = report.records.len(), "all texels within tolerance");
        } else {
            tracing::warn!(view = %report.name, semantic = %report.semantic, mismatches = report.mismatches, texels = report.records.len(), "texel mismatches");
        }

        let mismatches = report.mismatches;
        self.views.push(report);
        mismatches
    }

    /// Builds the aggregate report
    pub fn finalize(self) -> ValidationReport {
        let summary = ReportSummary {
            views: self.views.len(),
            texels_checked: self.views.iter().map(|view| view.records.len()).sum(),
            mismatches: self.views.iter().map(|view| view.mismatches).sum(),
        };
        ValidationReport { views: self.views, summary }
    }
}
