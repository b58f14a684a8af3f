//! Sheet Resequencer - recover canonical table structure from extracted workbooks.
//!
//! Workbooks produced by document extraction hold an index sheet listing the
//! expected tables and data sheets that stack several tables on top of each
//! other, delimited only by marker lines. This crate detects the tables,
//! matches them to the index, splits them into one sheet per table, gives
//! every sheet a stable canonical name and rewrites the index links.
//!
//! # Example
//!
//! ```
//! use sheet_resequencer::grouping::GroupingAssigner;
//!
//! let mut assigner = GroupingAssigner::new();
//! assert_eq!(assigner.next_id("Income", "Revenue").to_string(), "1");
//! assert_eq!(assigner.next_id("Income", "Costs").to_string(), "2");
//! assert_eq!(assigner.next_id("income", " Revenue ").to_string(), "1_1");
//! ```
//!
//! # Architecture
//!
//! Processing is split into a read-only planning phase and a mutating phase:
//!
//! - [`workbook`]: In-memory workbook model, xlsx reading and writing
//! - [`catalog`]: Index sheet parsing
//! - [`detect`]: Table block detection inside data sheets
//! - [`grouping`]: Canonical id assignment
//! - [`matching`]: Block/entry pairing strategies
//! - [`plan`]: The read-only plan combining the above
//! - [`splitter`]: Splitting multi-table sheets
//! - [`renamer`]: Two-phase conflict-free renaming
//! - [`rewriter`]: Index link rewriting and statistics
//! - [`orchestrator`]: Single-workbook and batch runs
//! - [`report`]: Warnings, statistics and report files
//! - [`config`]: Configuration constants, patterns and settings
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod catalog;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod grouping;
pub mod matching;
pub mod orchestrator;
pub mod plan;
pub mod renamer;
pub mod report;
pub mod rewriter;
pub mod splitter;
pub mod workbook;

// Re-export main functions
pub use orchestrator::{plan_workbook, process_batch, process_file, process_workbook};

// Re-export commonly used items
pub use config::{ReportFormat, ResequenceConfig};
pub use error::{ResequenceError, Result};
pub use report::{BatchReport, FileOutcome, RunStats, Warning, WarningKind};
pub use workbook::{CellValue, Grid, Sheet, SheetId, Workbook};
