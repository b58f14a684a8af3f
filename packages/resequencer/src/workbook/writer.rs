//! Write a workbook to `.xlsx` with rust_xlsxwriter.

use std::path::Path;

use rust_xlsxwriter::{Format, Url, Workbook as XlsxWorkbook};

use super::{CellValue, Workbook};
use crate::error::{ResequenceError, Result};

/// Save `workbook` to `path`, resolving navigation links to current sheet names.
pub fn write_workbook(workbook: &Workbook, path: &Path) -> Result<()> {
    let mut out = XlsxWorkbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for sheet in workbook.sheets() {
        let worksheet = out.add_worksheet();
        worksheet.set_name(sheet.name())?;

        for (row, col, value) in sheet.grid.iter_cells() {
            if sheet.links.contains_key(&(row, col)) {
                continue;
            }
            let (row, col) = cell_index(row, col)?;
            match value {
                CellValue::Text(text) => {
                    worksheet.write_string(row, col, text)?;
                }
                CellValue::Number(number) => {
                    worksheet.write_number(row, col, *number)?;
                }
                CellValue::Date(serial) => {
                    let format = if serial.fract() == 0.0 {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_number_with_format(row, col, *serial, format)?;
                }
                CellValue::Empty => {}
            }
        }

        for (&(row, col), target) in &sheet.links {
            let Some(target_sheet) = workbook.sheet(*target) else {
                tracing::warn!(
                    sheet = %sheet.name(),
                    row = row + 1,
                    link_target = %target,
                    "navigation link points at a sheet that no longer exists, skipping"
                );
                continue;
            };
            let text = sheet
                .grid
                .get(row, col)
                .map(ToString::to_string)
                .unwrap_or_default();
            let (row, col) = cell_index(row, col)?;
            let url = Url::new(internal_link(target_sheet.name()));
            if text.is_empty() {
                worksheet.write_url(row, col, url)?;
            } else {
                worksheet.write_url_with_text(row, col, url, text)?;
            }
        }
    }

    out.save(path)?;
    tracing::info!(path = %path.display(), sheets = workbook.len(), "saved workbook");
    Ok(())
}

/// Build an in-workbook hyperlink target for a sheet.
///
/// Sheet names are always quoted; embedded apostrophes are doubled.
#[must_use]
pub fn internal_link(sheet_name: &str) -> String {
    format!("internal:'{}'!A1", sheet_name.replace('\'', "''"))
}

fn cell_index(row: usize, col: usize) -> Result<(u32, u16)> {
    let row = u32::try_from(row).map_err(|_| out_of_range(row, col))?;
    let col = u16::try_from(col).map_err(|_| out_of_range(row as usize, col))?;
    Ok((row, col))
}

fn out_of_range(row: usize, col: usize) -> ResequenceError {
    ResequenceError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("cell ({row}, {col}) is outside the worksheet limits"),
    ))
}
