//! Load a workbook file into memory with calamine.

use std::path::Path;

use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader};
use chrono::NaiveDate;

use super::{CellValue, Grid, Workbook};
use crate::error::{ResequenceError, Result};

/// Read every sheet of the workbook at `path` into memory.
///
/// Cell positions are absolute: a sheet whose used range starts at `C5`
/// keeps its content at row 4, column 2.
pub fn read_workbook(path: &Path) -> Result<Workbook> {
    let mut source = open_workbook_auto(path).map_err(|source| ResequenceError::WorkbookRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut workbook = Workbook::new();
    for name in source.sheet_names() {
        let range = source
            .worksheet_range(&name)
            .map_err(|source| ResequenceError::SheetRead {
                sheet: name.clone(),
                source,
            })?;

        let mut grid = Grid::new();
        if let Some((row0, col0)) = range.start() {
            let (row0, col0) = (row0 as usize, col0 as usize);
            for (r, row) in range.rows().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    let cell = convert_cell(value);
                    if cell != CellValue::Empty {
                        grid.set(row0 + r, col0 + c, cell);
                    }
                }
            }
        }

        tracing::debug!(
            sheet = %name,
            rows = grid.height(),
            cols = grid.width(),
            "loaded sheet"
        );
        workbook.add_sheet(name, grid)?;
    }

    tracing::info!(
        path = %path.display(),
        sheets = workbook.len(),
        "loaded workbook"
    );
    Ok(workbook)
}

/// Fold calamine's cell types into the kinds structure recovery cares about.
fn convert_cell(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::DateTime(dt) if dt.is_datetime() => convert_date(dt),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.clone()),
        Data::Error(e) => CellValue::text(e.to_string()),
    }
}

/// Normalize a date to the 1900 system; 1904 workbooks carry other serials.
/// Dates Excel cannot express (its 1900-02-29) stay plain numbers.
fn convert_date(dt: &ExcelDateTime) -> CellValue {
    let (year, month, day, hour, min, sec, milli) = dt.to_ymd_hms_milli();
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| {
            date.and_hms_milli_opt(
                u32::from(hour),
                u32::from(min),
                u32::from(sec),
                u32::from(milli),
            )
        })
        .and_then(CellValue::date)
        .unwrap_or(CellValue::Number(dt.as_f64()))
}
