//! Physical splitting of multi-table sheets.
//!
//! The first mapping of a sheet (lowest block seq) stays in place and the
//! sheet is cut off after it; when that block lacks metadata or a back link
//! the sheet is rebuilt the same way new sheets are. Every other mapping gets
//! a new sheet holding a back-navigation link, one metadata block and the
//! block's data rows. Rows trailing a block travel with it.

use std::collections::BTreeMap;

use crate::catalog::IndexEntry;
use crate::config::ResequenceConfig;
use crate::detect::{is_back_nav_row, BlockOrigin, TableBlock};
use crate::error::Result;
use crate::plan::{SheetMapping, SheetPlan, WorkbookPlan};
use crate::renamer::temp_sheet_name;
use crate::report::{Warning, WarningKind};
use crate::workbook::{CellValue, Grid, SheetId, Workbook};

/// Where every entry ended up after splitting.
#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    /// Output sheet per entry seq.
    pub sheet_for_entry: BTreeMap<usize, SheetId>,
    /// Sheets created by splitting, in creation order.
    pub created: Vec<SheetId>,
    pub warnings: Vec<Warning>,
}

/// Creates one sheet per additional mapping of a split sheet.
pub struct SheetSplitter {
    back_nav_text: String,
    category_prefix: String,
    title_prefix: String,
    source_prefix: String,
}

impl SheetSplitter {
    #[must_use]
    pub fn new(config: &ResequenceConfig) -> Self {
        let first = |list: &[String], fallback: &str| {
            list.first()
                .map_or_else(|| fallback.to_string(), |p| p.trim().to_string())
        };
        Self {
            back_nav_text: config.back_nav_text.clone(),
            category_prefix: first(&config.markers.category, "Category (Parent):"),
            title_prefix: first(&config.markers.title, "Table Title:"),
            source_prefix: first(&config.markers.source, "Source:"),
        }
    }

    /// Split every planned sheet and re-link navigation cells to the index.
    pub fn apply(&self, workbook: &mut Workbook, plan: &WorkbookPlan) -> Result<SplitOutcome> {
        let mut outcome = SplitOutcome::default();

        for sheet_plan in &plan.sheets {
            if sheet_plan.is_split() {
                self.split_sheet(workbook, plan, sheet_plan, &mut outcome)?;
            } else {
                for &seq in plan.entries_for_sheet(sheet_plan.sheet) {
                    outcome.sheet_for_entry.insert(seq, sheet_plan.sheet);
                }
            }
        }

        let existing: Vec<SheetId> = workbook
            .sheets()
            .map(|s| s.id())
            .filter(|id| *id != plan.index.sheet && !outcome.created.contains(id))
            .collect();
        for sheet in existing {
            self.relink_back_nav(workbook, sheet, plan.index.sheet)?;
        }

        tracing::info!(created = outcome.created.len(), "split sheets");
        Ok(outcome)
    }

    fn split_sheet(
        &self,
        workbook: &mut Workbook,
        plan: &WorkbookPlan,
        sheet_plan: &SheetPlan,
        outcome: &mut SplitOutcome,
    ) -> Result<()> {
        let origin = sheet_plan.sheet;
        let original = workbook.sheet_mut(origin)?.grid.clone();
        let orphans = self.assign_orphans(sheet_plan);

        let mut position = workbook.index_of(origin)? + 1;
        for (i, mapping) in sheet_plan.mappings.iter().enumerate() {
            let carried: &[&TableBlock] = orphans.get(&i).map_or(&[], Vec::as_slice);

            if i == 0 {
                let rebuilt = match plan.index.entries.get(mapping.entry_seq) {
                    Some(entry) if self.needs_rebuild(&original, &mapping.block) => {
                        let mut grid = self.build_sheet(
                            &original,
                            mapping,
                            entry,
                            carried,
                            &mut outcome.warnings,
                        );
                        self.append_leading_rows(&original, &mapping.block, carried, &mut grid);
                        Some(grid)
                    }
                    _ => None,
                };

                let sheet = workbook.sheet_mut(origin)?;
                match rebuilt {
                    Some(grid) => {
                        sheet.grid = grid;
                        sheet.links.clear();
                        sheet.set_link((0, 0), self.back_nav_text.clone(), plan.index.sheet);
                        tracing::debug!(sheet = %sheet_plan.name, "rebuilt sheet in place");
                    }
                    None => {
                        let keep = carried
                            .iter()
                            .map(|b| b.end_row())
                            .fold(mapping.block.end_row(), usize::max);
                        sheet.grid.truncate_rows(keep);
                        sheet.links.retain(|(row, _), _| *row < keep);
                    }
                }
                outcome.sheet_for_entry.insert(mapping.entry_seq, origin);
                continue;
            }

            let Some(entry) = plan.index.entries.get(mapping.entry_seq) else {
                continue;
            };
            let grid = self.build_sheet(&original, mapping, entry, carried, &mut outcome.warnings);
            let name = temp_sheet_name(workbook);
            let id = workbook.insert_sheet(position, name, grid)?;
            workbook
                .sheet_mut(id)?
                .set_link((0, 0), self.back_nav_text.clone(), plan.index.sheet);
            position += 1;

            tracing::debug!(
                sheet = %sheet_plan.name,
                entry = mapping.entry_seq,
                block = mapping.block.seq,
                new_name = %mapping.new_sheet_name,
                "created split sheet"
            );
            outcome.sheet_for_entry.insert(mapping.entry_seq, id);
            outcome.created.push(id);
        }
        Ok(())
    }

    /// Whether the sheet kept in place lacks a metadata block or a back link.
    fn needs_rebuild(&self, original: &Grid, block: &TableBlock) -> bool {
        let has_back_nav = (0..block.start_row())
            .any(|row| is_back_nav_row(original, row, &self.back_nav_text));
        !block.has_metadata || !has_back_nav
    }

    /// Append content found above `block` to a rebuilt sheet, skipping rows
    /// already copied with a carried orphan.
    fn append_leading_rows(
        &self,
        original: &Grid,
        block: &TableBlock,
        carried: &[&TableBlock],
        grid: &mut Grid,
    ) {
        let rows: Vec<usize> = (0..block.start_row())
            .filter(|&row| {
                !original.is_blank_row(row)
                    && !is_back_nav_row(original, row, &self.back_nav_text)
                    && !carried.iter().any(|b| b.full_span().rows().contains(&row))
            })
            .collect();
        if rows.is_empty() {
            return;
        }
        grid.push_blank_row();
        for row in rows {
            grid.push_row(original.row(row).to_vec());
        }
    }

    /// Attach each orphan block to the mapping whose block precedes it.
    ///
    /// Keys are positions in `sheet_plan.mappings`; orphans above every
    /// matched block go with the first mapping.
    fn assign_orphans<'a>(
        &self,
        sheet_plan: &'a SheetPlan,
    ) -> BTreeMap<usize, Vec<&'a TableBlock>> {
        let mut carried: BTreeMap<usize, Vec<&TableBlock>> = BTreeMap::new();
        for orphan in &sheet_plan.orphans {
            let owner = sheet_plan
                .mappings
                .iter()
                .enumerate()
                .filter(|(_, m)| {
                    m.block.origin != BlockOrigin::Placeholder && m.block.seq < orphan.seq
                })
                .map(|(i, _)| i)
                .last()
                .unwrap_or(0);
            carried.entry(owner).or_default().push(orphan);
        }
        carried
    }

    /// Build the grid of a split-off sheet. Row 0 is left for the back link.
    fn build_sheet(
        &self,
        original: &Grid,
        mapping: &SheetMapping,
        entry: &IndexEntry,
        carried: &[&TableBlock],
        warnings: &mut Vec<Warning>,
    ) -> Grid {
        let block = &mapping.block;
        let mut grid = Grid::new();
        grid.push_row(vec![CellValue::text(self.back_nav_text.as_str())]);
        grid.push_blank_row();

        if block.has_metadata {
            grid.extend_from(original, block.metadata);
        } else if let Some(title) = block.title_text() {
            let source = block
                .source
                .clone()
                .unwrap_or_else(|| source_text(entry));
            grid.push_row(vec![self.line(&self.title_prefix, title)]);
            grid.push_row(vec![self.line(&self.source_prefix, &source)]);
            warnings.push(
                Warning::new(
                    WarningKind::MetadataMissing,
                    format!(
                        "table '{title}' ({}) has no metadata block, wrote title and source only",
                        mapping.new_sheet_name
                    ),
                )
                .with_sheet(&mapping.old_sheet_name),
            );
        } else {
            grid.push_row(vec![self.line(&self.category_prefix, &entry.section)]);
            grid.push_row(vec![self.line(&self.title_prefix, &entry.title)]);
            grid.push_row(vec![self.line(&self.source_prefix, &source_text(entry))]);
            warnings.push(
                Warning::new(
                    WarningKind::MetadataMissing,
                    format!(
                        "no metadata for {} ({}), synthesized from the index entry",
                        mapping.new_sheet_name,
                        block_label(block)
                    ),
                )
                .with_sheet(&mapping.old_sheet_name),
            );
        }

        grid.push_blank_row();
        grid.extend_from(original, block.body_span());

        for orphan in carried {
            grid.push_blank_row();
            grid.extend_from(original, orphan.full_span());
        }
        grid
    }

    fn line(&self, prefix: &str, value: &str) -> CellValue {
        CellValue::text(format!("{prefix} {}", value.trim()).trim_end())
    }

    /// Link back-navigation cells of an existing sheet to the index.
    fn relink_back_nav(
        &self,
        workbook: &mut Workbook,
        sheet: SheetId,
        index: SheetId,
    ) -> Result<()> {
        let sheet = workbook.sheet_mut(sheet)?;
        let rows: Vec<usize> = (0..sheet.grid.height())
            .filter(|&r| is_back_nav_row(&sheet.grid, r, &self.back_nav_text))
            .collect();
        for row in rows {
            sheet.links.insert((row, 0), index);
        }
        Ok(())
    }
}

/// "Annual report (Page 12)", or just the source when no page is known.
fn source_text(entry: &IndexEntry) -> String {
    match (entry.source.trim(), entry.page_no.trim()) {
        (source, "") => source.to_string(),
        ("", page) => format!("Page {page}"),
        (source, page) => format!("{source} (Page {page})"),
    }
}

fn block_label(block: &TableBlock) -> &'static str {
    match block.origin {
        BlockOrigin::Placeholder => "no block detected",
        BlockOrigin::WholeSheet => "whole sheet",
        BlockOrigin::UnitIndicator => "unit indicator block",
        BlockOrigin::SharedMetadata | BlockOrigin::TitleMarker => "untitled block",
    }
}
