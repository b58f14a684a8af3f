//! Index catalog parsing.
//!
//! The index sheet lists every expected table with its section, title and
//! source page, and a link token (e.g. `→ 12`) naming the data sheet that
//! holds it. Catalog row order is meaningful: it decides first-seen
//! precedence for canonical ids and the final sheet order.

use serde::Serialize;

use crate::config::{parse_link_token, ResequenceConfig, INDEX_HEADER_SEARCH_ROWS};
use crate::error::{ResequenceError, Result};
use crate::report::{Warning, WarningKind};
use crate::workbook::{Grid, Sheet, SheetId, Workbook};

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// Position in catalog order, starting at 0.
    pub seq: usize,
    /// Grid row of the entry in the index sheet.
    pub row: usize,
    pub source: String,
    pub page_no: String,
    pub table_id: String,
    pub location_id: String,
    pub section: String,
    pub title: String,
    /// Link cell text as read.
    pub link_text: String,
    /// Sheet name parsed from the link token.
    pub sheet_ref: Option<String>,
    /// Resolved target sheet, if the name exists in the workbook.
    #[serde(skip)]
    pub sheet: Option<SheetId>,
}

impl IndexEntry {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.sheet.is_some()
    }
}

/// Column positions of the index schema.
///
/// Only `link` is mandatory; missing optional columns read as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexColumns {
    pub source: Option<usize>,
    pub page_no: Option<usize>,
    pub table_id: Option<usize>,
    pub location_id: Option<usize>,
    pub section: Option<usize>,
    pub title: Option<usize>,
    pub link: usize,
}

impl IndexColumns {
    /// Find the header row and column positions in `grid`.
    fn locate(grid: &Grid) -> Option<(usize, Self)> {
        let rows = grid.height().min(INDEX_HEADER_SEARCH_ROWS);
        (0..rows).find_map(|row| {
            let headers: Vec<String> = grid
                .row(row)
                .iter()
                .map(|c| normalize_header(&c.to_string()))
                .collect();
            let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));

            let link = find(&["link"])?;
            Some((
                row,
                Self {
                    source: find(&["source"]),
                    page_no: find(&["pageno", "page", "pagenumber"]),
                    table_id: find(&["tableid"]),
                    location_id: find(&["locationid"]),
                    section: find(&["section"]),
                    title: find(&["tabletitle", "title"]),
                    link,
                },
            ))
        })
    }
}

/// Lowercase and drop spaces, underscores and dashes: "Table_ID" → "tableid".
fn normalize_header(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// The parsed index sheet.
#[derive(Debug, Clone, Serialize)]
pub struct IndexCatalog {
    pub sheet: SheetId,
    pub sheet_name: String,
    pub header_row: usize,
    pub columns: IndexColumns,
    pub entries: Vec<IndexEntry>,
    pub warnings: Vec<Warning>,
}

impl IndexCatalog {
    /// Find the index sheet: by configured name first, then by header shape.
    pub fn locate(workbook: &Workbook, config: &ResequenceConfig) -> Result<SheetId> {
        if let Some(sheet) = workbook.sheet_by_name(config.index_sheet.trim()) {
            return Ok(sheet.id());
        }

        workbook
            .sheets()
            .find(|sheet| {
                IndexColumns::locate(&sheet.grid).is_some_and(|(_, cols)| cols.title.is_some())
            })
            .map(Sheet::id)
            .ok_or_else(|| ResequenceError::NoIndexSheet {
                expected: config.index_sheet.clone(),
            })
    }

    /// Locate and parse the index sheet of `workbook`.
    pub fn parse(workbook: &Workbook, config: &ResequenceConfig) -> Result<Self> {
        let id = Self::locate(workbook, config)?;
        let sheet = workbook
            .sheet(id)
            .ok_or(ResequenceError::UnknownSheet(id))?;
        Self::from_sheet(sheet, workbook)
    }

    /// Parse `sheet` as the index, resolving links against `workbook`.
    pub fn from_sheet(sheet: &Sheet, workbook: &Workbook) -> Result<Self> {
        let (header_row, columns) =
            IndexColumns::locate(&sheet.grid).ok_or_else(|| ResequenceError::MissingIndexColumn {
                sheet: sheet.name().to_string(),
                column: "Link".to_string(),
            })?;

        let grid = &sheet.grid;
        let text = |row: usize, col: Option<usize>| {
            col.and_then(|c| grid.get(row, c))
                .map(|v| v.to_string().trim().to_string())
                .unwrap_or_default()
        };

        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for row in header_row + 1..grid.height() {
            if grid.is_blank_row(row) {
                continue;
            }

            let link_text = text(row, Some(columns.link));
            let sheet_ref = parse_link_token(&link_text);
            let target = sheet_ref
                .as_deref()
                .and_then(|name| workbook.sheet_by_name(name))
                .filter(|target| target.id() != sheet.id());

            if target.is_none() {
                let reason = match &sheet_ref {
                    None => format!("cannot parse link '{link_text}'"),
                    Some(name) => format!("link target '{name}' is not a data sheet"),
                };
                warnings.push(
                    Warning::new(
                        WarningKind::UnresolvedLink,
                        format!("index row {}: {reason}", row + 1),
                    )
                    .with_sheet(sheet.name()),
                );
            }

            entries.push(IndexEntry {
                seq: entries.len(),
                row,
                source: text(row, columns.source),
                page_no: text(row, columns.page_no),
                table_id: text(row, columns.table_id),
                location_id: text(row, columns.location_id),
                section: text(row, columns.section),
                title: text(row, columns.title),
                link_text,
                sheet_ref,
                sheet: target.map(Sheet::id),
            });
        }

        tracing::info!(
            sheet = %sheet.name(),
            entries = entries.len(),
            unresolved = warnings.len(),
            "parsed index catalog"
        );

        Ok(Self {
            sheet: sheet.id(),
            sheet_name: sheet.name().to_string(),
            header_row,
            columns,
            entries,
            warnings,
        })
    }

    /// Entries pointing at `sheet`, in catalog order.
    pub fn entries_for(&self, sheet: SheetId) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter().filter(move |e| e.sheet == Some(sheet))
    }

    /// Number of entries whose link did not resolve.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_resolved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        )
    }

    fn header() -> &'static [&'static str] {
        &[
            "Source",
            "PageNo",
            "Table_ID",
            "Location_ID",
            "Section",
            "Table Title",
            "Link",
        ]
    }

    fn workbook(index_name: &str, rows: &[&[&str]]) -> Workbook {
        let mut wb = Workbook::new();
        wb.add_sheet(index_name, grid(rows)).unwrap();
        wb.add_sheet("1", Grid::new()).unwrap();
        wb.add_sheet("2", Grid::new()).unwrap();
        wb
    }

    #[test]
    fn test_parse_entries_in_order() {
        let wb = workbook(
            "Index",
            &[
                header(),
                &["AR", "4", "1", "L1", "Income", "Revenue", "→ 1"],
                &["", "", "", "", "", "", ""],
                &["AR", "5", "2", "L2", "Income", "Costs", "→ 2"],
            ],
        );
        let catalog = IndexCatalog::parse(&wb, &ResequenceConfig::default()).unwrap();

        assert_eq!(catalog.header_row, 0);
        assert_eq!(catalog.entries.len(), 2);
        assert_eq!(catalog.entries[0].seq, 0);
        assert_eq!(catalog.entries[0].title, "Revenue");
        assert_eq!(catalog.entries[0].page_no, "4");
        assert_eq!(catalog.entries[1].seq, 1);
        assert_eq!(catalog.entries[1].row, 3);
        assert_eq!(catalog.entries[1].sheet_ref.as_deref(), Some("2"));
        assert!(catalog.entries.iter().all(IndexEntry::is_resolved));
        assert!(catalog.warnings.is_empty());
    }

    #[test]
    fn test_unparseable_link_is_kept_with_warning() {
        let wb = workbook(
            "Index",
            &[
                header(),
                &["AR", "4", "1", "", "Income", "Revenue", "see sheet"],
                &["AR", "5", "2", "", "Income", "Costs", "→ 2"],
            ],
        );
        let catalog = IndexCatalog::parse(&wb, &ResequenceConfig::default()).unwrap();

        assert_eq!(catalog.entries.len(), 2);
        assert_eq!(catalog.entries[0].sheet_ref, None);
        assert!(!catalog.entries[0].is_resolved());
        assert!(catalog.entries[1].is_resolved());
        assert_eq!(catalog.warnings.len(), 1);
        assert_eq!(catalog.warnings[0].kind, WarningKind::UnresolvedLink);
        assert_eq!(catalog.unresolved_count(), 1);
    }

    #[test]
    fn test_link_to_missing_sheet_is_unresolved() {
        let wb = workbook(
            "Index",
            &[header(), &["AR", "4", "9", "", "S", "T", "→ 9"]],
        );
        let catalog = IndexCatalog::parse(&wb, &ResequenceConfig::default()).unwrap();
        assert_eq!(catalog.entries[0].sheet_ref.as_deref(), Some("9"));
        assert_eq!(catalog.entries[0].sheet, None);
        assert_eq!(catalog.warnings.len(), 1);
    }

    #[test]
    fn test_locate_by_header_shape() {
        let wb = workbook(
            "Contents",
            &[
                &["Annual report tables"],
                header(),
                &["AR", "4", "1", "", "S", "T", "→ 1"],
            ],
        );
        let catalog = IndexCatalog::parse(&wb, &ResequenceConfig::default()).unwrap();
        assert_eq!(catalog.sheet_name, "Contents");
        assert_eq!(catalog.header_row, 1);
        assert_eq!(catalog.entries.len(), 1);
    }

    #[test]
    fn test_no_index_sheet() {
        let mut wb = Workbook::new();
        wb.add_sheet("1", grid(&[&["data"]])).unwrap();
        let err = IndexCatalog::parse(&wb, &ResequenceConfig::default()).unwrap_err();
        assert!(matches!(err, ResequenceError::NoIndexSheet { .. }));
        assert!(err.is_workbook_read_error());
    }

    #[test]
    fn test_index_without_link_column() {
        let wb = workbook("Index", &[&["Source", "Section", "Table Title"]]);
        let err = IndexCatalog::parse(&wb, &ResequenceConfig::default()).unwrap_err();
        assert!(matches!(err, ResequenceError::MissingIndexColumn { .. }));
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Table_ID"), "tableid");
        assert_eq!(normalize_header(" Table Title "), "tabletitle");
        assert_eq!(normalize_header("Location-ID"), "locationid");
    }
}
