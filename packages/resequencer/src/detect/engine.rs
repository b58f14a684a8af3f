//! Block detector that partitions a sheet grid into table blocks.

use super::markers::{
    create_marker_registry, is_back_nav_row, is_period_header_row, is_unit_indicator_row,
    MarkerKind, MarkerLine, MarkerRegistry,
};
use super::types::{BlockOrigin, Detection, TableBlock};
use crate::config::ResequenceConfig;
use crate::report::{Warning, WarningKind};
use crate::workbook::{Grid, RowSpan, Sheet, SheetId};

/// A title marker together with the metadata lines around it.
#[derive(Debug, Clone)]
struct Anchor {
    metadata: RowSpan,
    title: String,
    source: Option<String>,
    has_metadata: bool,
}

/// Detector for table blocks inside a data sheet.
///
/// Detection never fails: whatever the sheet looks like, at least one
/// block is returned and every guess is reported as a warning.
pub struct BlockDetector {
    markers: MarkerRegistry,
    source_window: usize,
    unit_header_window: usize,
    back_nav_text: String,
}

impl BlockDetector {
    /// Create a detector from run settings.
    #[must_use]
    pub fn new(config: &ResequenceConfig) -> Self {
        Self {
            markers: create_marker_registry(&config.markers),
            source_window: config.source_window,
            unit_header_window: config.unit_header_window,
            back_nav_text: config.back_nav_text.clone(),
        }
    }

    /// Detect blocks in a sheet.
    #[must_use]
    pub fn detect(&self, sheet: &Sheet) -> Detection {
        self.detect_grid(sheet.id(), sheet.name(), &sheet.grid)
    }

    /// Detect blocks in a grid that belongs to `sheet`.
    #[must_use]
    pub fn detect_grid(&self, sheet: SheetId, name: &str, grid: &Grid) -> Detection {
        let lines: Vec<Option<MarkerLine>> = (0..grid.height())
            .map(|row| self.markers.classify_row(grid, row))
            .collect();
        let titles: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.as_ref().is_some_and(|l| l.kind == MarkerKind::Title))
            .map(|(row, _)| row)
            .collect();

        let mut detection = Detection::default();

        if !titles.is_empty() {
            self.blocks_from_titles(sheet, name, grid, &lines, &titles, &mut detection);
        } else if let Some(blocks) = self.blocks_from_unit_indicators(sheet, grid) {
            detection.warnings.push(
                Warning::new(
                    WarningKind::DetectionAmbiguity,
                    format!(
                        "no title markers, split into {} blocks on unit indicator lines",
                        blocks.len()
                    ),
                )
                .with_sheet(name),
            );
            detection.blocks = blocks;
        } else {
            detection.warnings.push(
                Warning::new(WarningKind::DetectionAmbiguity, "no markers found")
                    .with_sheet(name),
            );
            detection.blocks.push(TableBlock::implicit(
                0,
                sheet,
                self.content_span(grid, 0, grid.height()),
                BlockOrigin::WholeSheet,
            ));
        }

        for (seq, block) in detection.blocks.iter_mut().enumerate() {
            block.seq = seq;
        }

        tracing::debug!(
            sheet = %name,
            blocks = detection.blocks.len(),
            titles = titles.len(),
            "detected blocks"
        );
        detection
    }

    /// Build one block per title marker, splitting shared-metadata sections.
    fn blocks_from_titles(
        &self,
        sheet: SheetId,
        name: &str,
        grid: &Grid,
        lines: &[Option<MarkerLine>],
        titles: &[usize],
        detection: &mut Detection,
    ) {
        let height = grid.height();
        let kind_at = |row: usize| lines.get(row).and_then(|l| l.as_ref()).map(|l| l.kind);

        // Pass 1: metadata around every title
        let mut anchors: Vec<Anchor> = Vec::with_capacity(titles.len());
        let mut lower = 0;
        for (i, &title_row) in titles.iter().enumerate() {
            let mut start = title_row;
            while start > lower && kind_at(start - 1).is_some_and(|k| k.is_metadata_prefix()) {
                start -= 1;
            }

            let next_title = titles.get(i + 1).copied().unwrap_or(height);
            // end of the unbroken run of marker lines starting at `from`
            let marker_run_end = |from: usize| {
                let mut row = from;
                while row < next_title && kind_at(row).is_some() {
                    row += 1;
                }
                row
            };
            let source_value = |row: usize| {
                lines[row]
                    .as_ref()
                    .map(|l| l.value.clone())
                    .filter(|v| !v.is_empty())
            };

            let title = lines[title_row]
                .as_ref()
                .map(|l| l.value.clone())
                .unwrap_or_default();

            let window_end = (title_row + 1 + self.source_window).min(next_title);
            let in_window =
                (title_row + 1..window_end).find(|r| kind_at(*r) == Some(MarkerKind::Source));

            let anchor = if let Some(source_row) = in_window {
                Anchor {
                    metadata: RowSpan::new(start, marker_run_end(source_row + 1)),
                    title,
                    source: source_value(source_row),
                    has_metadata: true,
                }
            } else {
                let run_end = marker_run_end(title_row + 1);
                let late_source =
                    (title_row + 1..run_end).find(|r| kind_at(*r) == Some(MarkerKind::Source));
                let message = match late_source {
                    Some(source_row) => format!(
                        "source line of title '{}' (row {}) is {} rows below it, beyond the window of {}",
                        title,
                        title_row + 1,
                        source_row - title_row,
                        self.source_window
                    ),
                    None => format!(
                        "no source line within {} rows of title '{}' (row {})",
                        self.source_window,
                        title,
                        title_row + 1
                    ),
                };
                detection.warnings.push(
                    Warning::new(WarningKind::DetectionAmbiguity, message).with_sheet(name),
                );
                Anchor {
                    metadata: RowSpan::new(start, run_end),
                    title,
                    source: late_source.and_then(source_value),
                    has_metadata: false,
                }
            };
            lower = anchor.metadata.end;
            anchors.push(anchor);
        }

        let first_start = anchors.first().map_or(0, |a| a.metadata.start);
        let stray = self.content_span(grid, 0, first_start);
        if !stray.is_empty() {
            detection.warnings.push(
                Warning::new(
                    WarningKind::DetectionAmbiguity,
                    format!("rows {stray} above the first table title belong to no block, kept with the first"),
                )
                .with_sheet(name),
            );
        }

        // Pass 2: data rows between metadata blocks
        for (i, anchor) in anchors.iter().enumerate() {
            let bound = anchors
                .get(i + 1)
                .map_or(height, |next| next.metadata.start);
            let data = self.data_span(grid, anchor.metadata.end, bound);
            if data.is_empty() {
                detection.warnings.push(
                    Warning::new(
                        WarningKind::DetectionAmbiguity,
                        format!("table '{}' has no data rows", anchor.title),
                    )
                    .with_sheet(name),
                );
            }

            let sections = self.shared_metadata_sections(grid, data);
            let origin = if sections.len() > 1 {
                detection.warnings.push(
                    Warning::new(
                        WarningKind::DetectionAmbiguity,
                        format!(
                            "metadata of '{}' shared by {} data sections",
                            anchor.title,
                            sections.len()
                        ),
                    )
                    .with_sheet(name),
                );
                BlockOrigin::SharedMetadata
            } else {
                BlockOrigin::TitleMarker
            };

            let last = sections.len() - 1;
            for (n, section) in sections.into_iter().enumerate() {
                // content between the last section and the next metadata block
                let trailer = if n == last {
                    self.content_span(grid, section.end.max(anchor.metadata.end), bound)
                } else {
                    RowSpan::empty(section.end)
                };
                if !trailer.is_empty() {
                    detection.warnings.push(
                        Warning::new(
                            WarningKind::DetectionAmbiguity,
                            format!(
                                "rows {trailer} below table '{}' belong to no table, kept with it",
                                anchor.title
                            ),
                        )
                        .with_sheet(name),
                    );
                }
                detection.blocks.push(TableBlock {
                    seq: 0,
                    sheet,
                    metadata: anchor.metadata,
                    data: section,
                    title: Some(anchor.title.clone()).filter(|t| !t.is_empty()),
                    source: anchor.source.clone(),
                    has_metadata: anchor.has_metadata,
                    origin,
                    trailer,
                });
            }
        }
    }

    /// Split a block's data where it restarts with a unit-indicator / period header.
    ///
    /// Returns the data span unchanged unless at least two restarts are found
    /// and the first one opens the data.
    fn shared_metadata_sections(&self, grid: &Grid, data: RowSpan) -> Vec<RowSpan> {
        let starts = self.unit_header_rows(grid, data);
        let opens_data = starts
            .first()
            .is_some_and(|first| *first <= data.start + self.unit_header_window);
        if starts.len() < 2 || !opens_data {
            return vec![data];
        }

        let mut sections = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let start = if i == 0 { data.start } else { start };
            let end = starts.get(i + 1).copied().unwrap_or(data.end);
            sections.push(self.trim_trailing_blank(grid, RowSpan::new(start, end)));
        }
        sections
    }

    /// Fallback for sheets without title markers.
    fn blocks_from_unit_indicators(&self, sheet: SheetId, grid: &Grid) -> Option<Vec<TableBlock>> {
        let all = RowSpan::new(0, grid.height());
        let starts = self.unit_header_rows(grid, all);
        if starts.len() < 2 {
            return None;
        }

        let content = self.content_span(grid, 0, grid.height());
        let blocks = starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                // content above the first indicator belongs to the first block
                let start = if i == 0 { content.start.min(start) } else { start };
                let end = starts.get(i + 1).copied().unwrap_or(grid.height());
                let data = self.trim_trailing_blank(grid, RowSpan::new(start, end));
                TableBlock::implicit(i, sheet, data, BlockOrigin::UnitIndicator)
            })
            .collect();
        Some(blocks)
    }

    /// Rows inside `span` that hold a unit indicator followed by a period header.
    fn unit_header_rows(&self, grid: &Grid, span: RowSpan) -> Vec<usize> {
        span.rows()
            .filter(|&row| is_unit_indicator_row(grid, row))
            .filter(|&row| {
                let last = (row + self.unit_header_window).min(span.end.saturating_sub(1));
                (row..=last).any(|r| is_period_header_row(grid, r))
            })
            .collect()
    }

    /// Data rows starting after `from`: skip leading blanks, stop before two
    /// consecutive blank rows or at `bound`.
    fn data_span(&self, grid: &Grid, from: usize, bound: usize) -> RowSpan {
        let mut start = from;
        while start < bound && self.is_skippable(grid, start) {
            start += 1;
        }
        if start >= bound {
            return RowSpan::empty(from.min(bound));
        }

        let mut end = start;
        while end < bound {
            if grid.is_blank_row(end) && (end + 1 >= bound || grid.is_blank_row(end + 1)) {
                break;
            }
            end += 1;
        }
        self.trim_trailing_blank(grid, RowSpan::new(start, end))
    }

    /// Non-blank, non-navigation rows between `from` and `to`, as one span.
    fn content_span(&self, grid: &Grid, from: usize, to: usize) -> RowSpan {
        let first = (from..to).find(|&r| !self.is_skippable(grid, r));
        let last = (from..to).rev().find(|&r| !self.is_skippable(grid, r));
        match (first, last) {
            (Some(first), Some(last)) => RowSpan::new(first, last + 1),
            _ => RowSpan::empty(from),
        }
    }

    fn trim_trailing_blank(&self, grid: &Grid, span: RowSpan) -> RowSpan {
        let mut end = span.end;
        while end > span.start && grid.is_blank_row(end - 1) {
            end -= 1;
        }
        RowSpan::new(span.start, end)
    }

    fn is_skippable(&self, grid: &Grid, row: usize) -> bool {
        grid.is_blank_row(row) || is_back_nav_row(grid, row, &self.back_nav_text)
    }
}
