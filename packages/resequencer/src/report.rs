//! Run statistics, non-fatal warnings and report files.
//!
//! A run never fails because of ambiguous structure. Each recoverable
//! condition becomes a [`Warning`] and, where it has a natural count, a
//! statistics entry; both end up in the report written next to the output
//! workbook.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ReportFormat;
use crate::error::Result;

/// Category of a non-fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Block boundaries were uncertain and a fallback heuristic was used.
    DetectionAmbiguity,
    /// A matched block had no usable metadata; minimal or synthesized metadata was written.
    MetadataMissing,
    /// Detected block count differs from the number of index entries for a sheet.
    CountMismatch,
    /// Two sheets wanted the same final name; one got a suffix.
    RenameConflict,
    /// An index link could not be resolved to a sheet.
    UnresolvedLink,
}

impl WarningKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectionAmbiguity => "detection ambiguity",
            Self::MetadataMissing => "metadata missing",
            Self::CountMismatch => "count mismatch",
            Self::RenameConflict => "rename conflict",
            Self::UnresolvedLink => "unresolved link",
        }
    }
}

/// A recorded non-fatal condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub message: String,
}

impl Warning {
    #[must_use]
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sheet: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }
}

/// Block/entry count difference for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountMismatch {
    pub sheet: String,
    pub blocks: usize,
    pub entries: usize,
}

/// A final-name collision resolved with a suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameConflict {
    pub target: String,
    pub resolved_as: String,
}

/// Statistics for one processed workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub sheets_before: usize,
    pub sheets_after: usize,
    pub index_entries: usize,
    pub blocks_detected: usize,
    pub sheets_created: usize,
    pub unresolved_links: usize,
    pub count_mismatches: Vec<CountMismatch>,
    pub rename_conflicts: Vec<RenameConflict>,
    pub warnings: Vec<Warning>,
}

impl RunStats {
    /// Record a warning and log it.
    pub fn record(&mut self, warning: Warning) {
        tracing::warn!(
            kind = warning.kind.as_str(),
            sheet = warning.sheet.as_deref().unwrap_or("-"),
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    /// Record several warnings.
    pub fn record_all(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for warning in warnings {
            self.record(warning);
        }
    }

    /// Number of warnings of a given kind.
    #[must_use]
    pub fn warning_count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// Outcome of one file in a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FileOutcome {
    Success {
        input: PathBuf,
        output: PathBuf,
        report: PathBuf,
        stats: RunStats,
    },
    Failed {
        input: PathBuf,
        error: String,
    },
}

impl FileOutcome {
    #[must_use]
    pub fn input(&self) -> &Path {
        match self {
            Self::Success { input, .. } | Self::Failed { input, .. } => input,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Totals across every file of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub sheets_before: usize,
    pub sheets_after: usize,
    pub blocks_detected: usize,
    pub sheets_created: usize,
    pub count_mismatches: usize,
    pub rename_conflicts: usize,
    pub warnings: usize,
}

/// Consolidated report of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub totals: BatchTotals,
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    /// Build a report from per-file outcomes, in the order given.
    #[must_use]
    pub fn new(files: Vec<FileOutcome>) -> Self {
        let mut totals = BatchTotals {
            files: files.len(),
            ..BatchTotals::default()
        };
        for outcome in &files {
            match outcome {
                FileOutcome::Success { stats, .. } => {
                    totals.succeeded += 1;
                    totals.sheets_before += stats.sheets_before;
                    totals.sheets_after += stats.sheets_after;
                    totals.blocks_detected += stats.blocks_detected;
                    totals.sheets_created += stats.sheets_created;
                    totals.count_mismatches += stats.count_mismatches.len();
                    totals.rename_conflicts += stats.rename_conflicts.len();
                    totals.warnings += stats.warnings.len();
                }
                FileOutcome::Failed { .. } => totals.failed += 1,
            }
        }
        Self {
            generated_at: Utc::now(),
            totals,
            files,
        }
    }
}

/// Serialize `value` in the given format.
pub fn render_report<T: Serialize>(value: &T, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Json => serde_json::to_string_pretty(value)?,
        ReportFormat::Yaml => serde_yaml_ng::to_string(value)?,
    })
}

/// Write `value` to `path` in the given format.
pub fn write_report<T: Serialize>(value: &T, path: &Path, format: ReportFormat) -> Result<()> {
    let text = render_report(value, format)?;
    fs::write(path, text)?;
    tracing::debug!(path = %path.display(), "wrote report");
    Ok(())
}
