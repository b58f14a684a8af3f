//! Flat row-major cell storage.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single cell value.
///
/// Booleans and error cells are folded into text when the workbook is read.
/// Dates keep their serial number so they can be written back as dates.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Serial day number in the 1900 date system.
    Date(f64),
}

fn date_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

impl CellValue {
    /// Create a text cell, collapsing empty strings to [`CellValue::Empty`].
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Whether the cell holds nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }

    /// Date cell for a calendar date-time.
    #[must_use]
    pub fn date(value: NaiveDateTime) -> Option<Self> {
        let millis = value.signed_duration_since(date_epoch()?).num_milliseconds();
        Some(Self::Date(millis as f64 / MILLIS_PER_DAY))
    }

    /// Calendar date-time of a date cell.
    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        let Self::Date(serial) = self else {
            return None;
        };
        let millis = (serial * MILLIS_PER_DAY).round();
        if !millis.is_finite() || millis.abs() > 1e15 {
            return None;
        }
        date_epoch()?.checked_add_signed(TimeDelta::milliseconds(millis as i64))
    }

    /// Text content, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(serial) => match self.as_datetime() {
                Some(dt) if dt.time() == NaiveTime::MIN => write!(f, "{}", dt.format("%Y-%m-%d")),
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{serial}"),
            },
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Half-open range of row indices (`start..end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RowSpan {
    pub start: usize,
    pub end: usize,
}

impl RowSpan {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Empty span anchored at `at`.
    #[must_use]
    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Iterate the row indices in this span.
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for RowSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "-")
        } else {
            // 1-based inclusive, the way spreadsheet users read row numbers
            write!(f, "{}-{}", self.start + 1, self.end)
        }
    }
}

/// Row-major grid of cells with a fixed width.
///
/// Cells live in one contiguous `Vec`; row `r` occupies
/// `cells[r * width..(r + 1) * width]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    width: usize,
    cells: Vec<CellValue>,
}

impl Grid {
    /// Create an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from row vectors, padding short rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let mut grid = Self::new();
        for row in rows {
            grid.push_row(row);
        }
        grid
    }

    #[must_use]
    pub fn height(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.cells.len() / self.width
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Cell at `(row, col)`, `None` when outside the grid.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        if col >= self.width || row >= self.height() {
            return None;
        }
        self.cells.get(row * self.width + col)
    }

    /// The full row as a slice (empty when out of range).
    #[must_use]
    pub fn row(&self, row: usize) -> &[CellValue] {
        if row >= self.height() {
            return &[];
        }
        let start = row * self.width;
        &self.cells[start..start + self.width]
    }

    /// Whether every cell in the row is blank. Rows past the end count as blank.
    #[must_use]
    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(CellValue::is_blank)
    }

    /// Trimmed text of the first column, if it holds non-blank text.
    #[must_use]
    pub fn first_text(&self, row: usize) -> Option<&str> {
        self.get(row, 0)
            .and_then(CellValue::as_text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        self.ensure_width(col + 1);
        let height = self.height();
        if row >= height {
            self.cells
                .resize((row + 1) * self.width, CellValue::Empty);
        }
        let idx = row * self.width + col;
        self.cells[idx] = value;
    }

    /// Append a row at the bottom, widening the grid if the row is wider.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        self.ensure_width(row.len().max(1));
        row.resize(self.width, CellValue::Empty);
        self.cells.extend(row);
    }

    /// Append a blank row.
    pub fn push_blank_row(&mut self) {
        self.push_row(Vec::new());
    }

    /// Append copies of `span` rows from `other`.
    pub fn extend_from(&mut self, other: &Grid, span: RowSpan) {
        for r in span.rows() {
            self.push_row(trim_trailing_blanks(other.row(r)));
        }
    }

    /// Drop every row at or after `height`.
    pub fn truncate_rows(&mut self, height: usize) {
        if height < self.height() {
            self.cells.truncate(height * self.width);
        }
    }

    /// Rows of the given span as owned vectors, for comparisons.
    #[must_use]
    pub fn rows_in(&self, span: RowSpan) -> Vec<Vec<CellValue>> {
        span.rows()
            .filter(|r| *r < self.height())
            .map(|r| trim_trailing_blanks(self.row(r)))
            .collect()
    }

    /// Iterate `(row, col, value)` for every non-empty cell.
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, &CellValue)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, v)| !matches!(v, CellValue::Empty))
            .map(move |(i, v)| (i / width, i % width, v))
    }

    fn ensure_width(&mut self, width: usize) {
        if width <= self.width {
            return;
        }
        let height = self.height();
        let mut cells = Vec::with_capacity(height * width);
        for r in 0..height {
            let start = r * self.width;
            cells.extend_from_slice(&self.cells[start..start + self.width]);
            cells.resize(cells.len() + (width - self.width), CellValue::Empty);
        }
        self.width = width;
        self.cells = cells;
    }
}

fn trim_trailing_blanks(row: &[CellValue]) -> Vec<CellValue> {
    let len = row
        .iter()
        .rposition(|c| !matches!(c, CellValue::Empty))
        .map_or(0, |i| i + 1);
    row[..len].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::text(s)
    }

    #[test]
    fn test_push_row_widens_existing_rows() {
        let mut grid = Grid::new();
        grid.push_row(vec![text("a")]);
        grid.push_row(vec![text("b"), CellValue::Number(2.0), text("c")]);

        assert_eq!(grid.height(), 2);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.get(0, 0), Some(&text("a")));
        assert_eq!(grid.get(0, 2), Some(&CellValue::Empty));
        assert_eq!(grid.get(1, 1), Some(&CellValue::Number(2.0)));
        assert_eq!(grid.get(2, 0), None);
    }

    #[test]
    fn test_set_grows_grid() {
        let mut grid = Grid::new();
        grid.set(3, 2, text("x"));
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 3);
        assert!(grid.is_blank_row(0));
        assert!(!grid.is_blank_row(3));
        assert!(grid.is_blank_row(10));
    }

    #[test]
    fn test_first_text_trims_and_skips_blank() {
        let grid = Grid::from_rows(vec![
            vec![text("  Table Title: X  ")],
            vec![text("   ")],
            vec![CellValue::Number(4.0)],
        ]);
        assert_eq!(grid.first_text(0), Some("Table Title: X"));
        assert_eq!(grid.first_text(1), None);
        assert_eq!(grid.first_text(2), None);
    }

    #[test]
    fn test_extend_from_and_truncate() {
        let source = Grid::from_rows(vec![
            vec![text("a")],
            vec![text("b"), text("b2")],
            vec![text("c")],
        ]);
        let mut target = Grid::new();
        target.extend_from(&source, RowSpan::new(1, 3));
        assert_eq!(target.rows_in(RowSpan::new(0, 2)), source.rows_in(RowSpan::new(1, 3)));

        target.truncate_rows(1);
        assert_eq!(target.height(), 1);
    }

    #[test]
    fn test_number_display() {
        assert_eq!(CellValue::Number(2023.0).to_string(), "2023");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn test_date_display() {
        assert_eq!(CellValue::Date(45292.0).to_string(), "2024-01-01");
        assert_eq!(CellValue::Date(45292.5).to_string(), "2024-01-01 12:00:00");
        assert!(!CellValue::Date(45292.0).is_blank());

        let dt = NaiveDate::from_ymd_opt(2024, 3, 31)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let cell = CellValue::date(dt).unwrap();
        assert_eq!(cell, CellValue::Date(45382.0));
        assert_eq!(cell.as_datetime(), Some(dt));
    }

    #[test]
    fn test_row_span_display_is_one_based() {
        assert_eq!(RowSpan::new(2, 5).to_string(), "3-5");
        assert_eq!(RowSpan::empty(4).to_string(), "-");
        assert_eq!(RowSpan::new(5, 2).len(), 0);
    }
}
