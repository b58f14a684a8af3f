//! Error types for the resequencer.
//!
//! Only conditions that stop processing of a single workbook are errors.
//! Everything the pipeline can recover from (ambiguous detection, missing
//! metadata, count mismatches, rename conflicts) is recorded as a
//! [`crate::report::Warning`] instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::workbook::SheetId;

/// Main error type for the resequencer library.
#[derive(Debug, Error)]
pub enum ResequenceError {
    /// The input workbook could not be opened or decoded.
    #[error("Failed to read workbook {}: {source}", .path.display())]
    WorkbookRead {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    /// A single sheet of an otherwise readable workbook could not be decoded.
    #[error("Failed to read sheet '{sheet}': {source}")]
    SheetRead {
        sheet: String,
        #[source]
        source: calamine::Error,
    },

    /// No sheet in the workbook looks like the index catalog.
    #[error("No index sheet found (looked for '{expected}' or a sheet with Link/Table Title headers)")]
    NoIndexSheet { expected: String },

    /// The index sheet is missing a column the catalog cannot work without.
    #[error("Index sheet '{sheet}' has no '{column}' column")]
    MissingIndexColumn { sheet: String, column: String },

    /// A sheet name is already used by another sheet.
    #[error("Sheet name '{0}' is already taken")]
    SheetNameTaken(String),

    /// A sheet name violates spreadsheet naming rules.
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: String },

    /// A sheet id does not belong to the workbook.
    #[error("Unknown sheet id {0}")]
    UnknownSheet(SheetId),

    /// Configuration value is out of range or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing the output workbook failed.
    #[error("Failed to write workbook: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON report serialization failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML report serialization failed.
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// No workbook files were found among the inputs.
    #[error("No workbook files found in the given inputs")]
    NoInputs,

    /// Every file of a batch failed.
    #[error("All {0} input files failed")]
    AllFilesFailed(usize),

    /// The batch worker pool could not be started.
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ResequenceError {
    /// Whether this error means the input workbook itself is unusable.
    ///
    /// These are the errors a batch run reports per file and then moves on.
    #[must_use]
    pub fn is_workbook_read_error(&self) -> bool {
        matches!(
            self,
            Self::WorkbookRead { .. }
                | Self::SheetRead { .. }
                | Self::NoIndexSheet { .. }
                | Self::MissingIndexColumn { .. }
        )
    }
}

/// Result type alias for resequencer operations.
pub type Result<T> = std::result::Result<T, ResequenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResequenceError::MissingIndexColumn {
            sheet: "Index".to_string(),
            column: "Link".to_string(),
        };
        assert_eq!(err.to_string(), "Index sheet 'Index' has no 'Link' column");
    }

    #[test]
    fn test_no_index_sheet_is_read_error() {
        let err = ResequenceError::NoIndexSheet {
            expected: "Index".to_string(),
        };
        assert!(err.is_workbook_read_error());
        assert!(err.to_string().contains("'Index'"));
    }

    #[test]
    fn test_name_taken_is_not_read_error() {
        let err = ResequenceError::SheetNameTaken("7".to_string());
        assert!(!err.is_workbook_read_error());
        assert_eq!(err.to_string(), "Sheet name '7' is already taken");
    }
}
