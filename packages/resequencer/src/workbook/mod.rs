//! In-memory workbook model.
//!
//! A [`Workbook`] owns its sheets exclusively for the duration of one run.
//! Sheets are addressed by a stable [`SheetId`] because both their position
//! and their name change while a workbook is being re-sequenced.

mod grid;
mod reader;
mod writer;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::MAX_SHEET_NAME_LEN;
use crate::error::{ResequenceError, Result};

pub use grid::{CellValue, Grid, RowSpan};
pub use reader::read_workbook;
pub use writer::write_workbook;

/// Stable identifier of a sheet within one workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SheetId(pub u32);

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cell position `(row, col)`, zero-based.
pub type CellRef = (usize, usize);

/// A named grid of cells plus its in-workbook navigation links.
#[derive(Debug, Clone)]
pub struct Sheet {
    id: SheetId,
    name: String,
    /// Cell contents.
    pub grid: Grid,
    /// Cells that navigate to another sheet of the same workbook.
    ///
    /// Targets are ids, so links keep pointing at the right sheet when
    /// sheets are renamed.
    pub links: BTreeMap<CellRef, SheetId>,
}

impl Sheet {
    #[must_use]
    pub fn id(&self) -> SheetId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Put a navigation link at `(row, col)` with the given display text.
    pub fn set_link(&mut self, at: CellRef, text: impl Into<String>, target: SheetId) {
        self.grid.set(at.0, at.1, CellValue::text(text));
        self.links.insert(at, target);
    }
}

/// One applied rename, kept for auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRecord {
    pub sheet: SheetId,
    pub from: String,
    pub to: String,
}

/// Ordered collection of uniquely named sheets.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    next_id: u32,
    history: Vec<RenameRecord>,
}

impl Workbook {
    /// Create an empty workbook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet at the end.
    pub fn add_sheet(&mut self, name: impl Into<String>, grid: Grid) -> Result<SheetId> {
        let position = self.sheets.len();
        self.insert_sheet(position, name, grid)
    }

    /// Insert a sheet at `position` (clamped to the end).
    pub fn insert_sheet(
        &mut self,
        position: usize,
        name: impl Into<String>,
        grid: Grid,
    ) -> Result<SheetId> {
        let name = name.into();
        validate_sheet_name(&name)?;
        if self.is_name_taken(&name) {
            return Err(ResequenceError::SheetNameTaken(name));
        }

        let id = SheetId(self.next_id);
        self.next_id += 1;

        let position = position.min(self.sheets.len());
        self.sheets.insert(
            position,
            Sheet {
                id,
                name,
                grid,
                links: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    /// Rename a sheet. Fails if another sheet already uses the name.
    pub fn rename_sheet(&mut self, id: SheetId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_sheet_name(&name)?;

        let index = self.index_of(id)?;
        if self.sheets[index].name == name {
            return Ok(());
        }
        if self
            .sheets
            .iter()
            .any(|s| s.id != id && names_equal(&s.name, &name))
        {
            return Err(ResequenceError::SheetNameTaken(name));
        }

        let from = std::mem::replace(&mut self.sheets[index].name, name.clone());
        self.history.push(RenameRecord {
            sheet: id,
            from,
            to: name,
        });
        Ok(())
    }

    /// Whether any sheet uses `name` (case-insensitive).
    #[must_use]
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| names_equal(&s.name, name))
    }

    /// Look up a sheet by id.
    #[must_use]
    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    /// Mutable lookup by id.
    pub fn sheet_mut(&mut self, id: SheetId) -> Result<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(ResequenceError::UnknownSheet(id))
    }

    /// Look up a sheet by name (case-insensitive).
    #[must_use]
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| names_equal(&s.name, name))
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Sheet names in workbook order.
    #[must_use]
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Current position of a sheet.
    pub fn index_of(&self, id: SheetId) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.id == id)
            .ok_or(ResequenceError::UnknownSheet(id))
    }

    /// Reorder sheets to follow `order`; sheets not listed keep their
    /// relative order after the listed ones.
    pub fn reorder(&mut self, order: &[SheetId]) {
        let rank = |id: SheetId| order.iter().position(|o| *o == id).unwrap_or(usize::MAX);
        // stable sort keeps unlisted sheets in their current order
        self.sheets.sort_by_key(|s| rank(s.id));
    }

    /// Every rename applied so far, in order.
    #[must_use]
    pub fn rename_history(&self) -> &[RenameRecord] {
        &self.history
    }
}

/// Sheet names compare case-insensitively in spreadsheet applications.
#[must_use]
pub fn names_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Check a sheet name against spreadsheet naming rules.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(ResequenceError::InvalidSheetName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return invalid("name is longer than 31 characters");
    }
    if name.contains(&['[', ']', ':', '*', '?', '/', '\\'][..]) {
        return invalid("name contains one of [ ] : * ? / \\");
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("name starts or ends with an apostrophe");
    }
    Ok(())
}
