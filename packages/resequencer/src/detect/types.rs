//! Types produced by block detection.

use serde::Serialize;

use crate::report::Warning;
use crate::workbook::{RowSpan, SheetId};

/// How a block boundary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOrigin {
    /// Anchored on a title marker line.
    TitleMarker,
    /// One section of a metadata block shared by several data sections.
    SharedMetadata,
    /// Bounded by unit-indicator / period-header lines (no title markers in the sheet).
    UnitIndicator,
    /// The whole sheet, because nothing else was recognised.
    WholeSheet,
    /// Stand-in for an index entry that had no block left to match.
    Placeholder,
}

/// A detected logical table inside a sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableBlock {
    /// Position in detection order (top to bottom), starting at 0.
    pub seq: usize,
    pub sheet: SheetId,
    pub metadata: RowSpan,
    pub data: RowSpan,
    pub title: Option<String>,
    pub source: Option<String>,
    pub has_metadata: bool,
    pub origin: BlockOrigin,
    /// Content after the end of the data that belongs to no other block,
    /// such as footnotes below a double blank row. Travels with the block.
    pub trailer: RowSpan,
}

impl TableBlock {
    /// Block with no metadata and the given data rows.
    #[must_use]
    pub fn implicit(seq: usize, sheet: SheetId, data: RowSpan, origin: BlockOrigin) -> Self {
        Self {
            seq,
            sheet,
            metadata: RowSpan::empty(data.start),
            data,
            title: None,
            source: None,
            has_metadata: false,
            origin,
            trailer: RowSpan::empty(data.end),
        }
    }

    /// Empty stand-in block for an unmatched index entry.
    #[must_use]
    pub fn placeholder(seq: usize, sheet: SheetId) -> Self {
        Self::implicit(seq, sheet, RowSpan::empty(0), BlockOrigin::Placeholder)
    }

    /// First row belonging to the block (metadata or data).
    #[must_use]
    pub fn start_row(&self) -> usize {
        if self.metadata.is_empty() {
            self.data.start
        } else {
            self.metadata.start.min(self.data.start)
        }
    }

    /// Last row (exclusive) the block owns, trailer included.
    #[must_use]
    pub fn end_row(&self) -> usize {
        self.data.end.max(self.trailer.end)
    }

    /// Rows from the block's first row to its last, trailer included.
    #[must_use]
    pub fn full_span(&self) -> RowSpan {
        RowSpan::new(self.start_row(), self.end_row())
    }

    /// Data rows plus whatever lies between them and the end of the trailer.
    #[must_use]
    pub fn body_span(&self) -> RowSpan {
        if self.trailer.is_empty() {
            self.data
        } else {
            RowSpan::new(self.data.start, self.end_row())
        }
    }

    /// Trimmed, non-empty title.
    #[must_use]
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Blocks found in one sheet plus what was ambiguous about them.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub blocks: Vec<TableBlock>,
    pub warnings: Vec<Warning>,
}
