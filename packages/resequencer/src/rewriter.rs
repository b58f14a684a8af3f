//! Index rewriting and run statistics.

use crate::error::Result;
use crate::plan::WorkbookPlan;
use crate::renamer::RenameOutcome;
use crate::report::RunStats;
use crate::splitter::SplitOutcome;
use crate::workbook::{CellValue, SheetId, Workbook};

/// Link token written into the index for a sheet.
#[must_use]
pub fn link_token(sheet_name: &str) -> String {
    format!("→ {sheet_name}")
}

/// Points the index at the final sheets and puts them in catalog order.
pub struct IndexRewriter;

impl IndexRewriter {
    /// Rewrite Link and Table_ID cells, reorder sheets and collect statistics.
    ///
    /// Final order: index sheet, then output sheets in catalog order, then
    /// every other sheet in its current order.
    pub fn apply(
        workbook: &mut Workbook,
        plan: &WorkbookPlan,
        split: &SplitOutcome,
        renamed: &RenameOutcome,
        sheets_before: usize,
    ) -> Result<RunStats> {
        let index_id = plan.index.sheet;
        let columns = plan.index.columns;

        let mut updates: Vec<(usize, SheetId, String)> = Vec::new();
        for entry in &plan.index.entries {
            let Some(&sheet) = split.sheet_for_entry.get(&entry.seq) else {
                continue;
            };
            let Some(name) = workbook.sheet(sheet).map(|s| s.name().to_string()) else {
                continue;
            };
            updates.push((entry.row, sheet, name));
        }

        let index = workbook.sheet_mut(index_id)?;
        for (row, sheet, name) in &updates {
            index.set_link((*row, columns.link), link_token(name), *sheet);
            if let Some(col) = columns.table_id {
                index.grid.set(*row, col, CellValue::text(name.as_str()));
            }
        }

        let mut order = vec![index_id];
        for (_, sheet, _) in &updates {
            if !order.contains(sheet) {
                order.push(*sheet);
            }
        }
        workbook.reorder(&order);

        let mut stats = RunStats {
            sheets_before,
            sheets_after: workbook.len(),
            index_entries: plan.index.entries.len(),
            blocks_detected: plan.blocks_detected(),
            sheets_created: split.created.len(),
            unresolved_links: plan.index.unresolved_count(),
            count_mismatches: plan.count_mismatches(),
            rename_conflicts: renamed.conflicts.clone(),
            ..RunStats::default()
        };
        stats.record_all(plan.warnings.iter().cloned());
        stats.record_all(split.warnings.iter().cloned());
        stats.record_all(renamed.warnings.iter().cloned());

        tracing::info!(
            index = %plan.index.sheet_name,
            links = updates.len(),
            sheets = stats.sheets_after,
            "rewrote index"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResequenceConfig;
    use crate::matching::GreedyBestMatch;
    use crate::renamer::SheetRenamer;
    use crate::splitter::SheetSplitter;
    use crate::workbook::Grid;
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        )
    }

    fn run(wb: &mut Workbook) -> RunStats {
        let config = ResequenceConfig::default();
        let before = wb.len();
        let plan = WorkbookPlan::build(wb, &config, GreedyBestMatch).unwrap();
        let split = SheetSplitter::new(&config).apply(wb, &plan).unwrap();
        let assignments: Vec<(SheetId, String)> = plan
            .index
            .entries
            .iter()
            .filter_map(|e| {
                let sheet = split.sheet_for_entry.get(&e.seq)?;
                Some((*sheet, plan.canonical_ids[e.seq].sheet_name()))
            })
            .collect();
        let renamed = SheetRenamer::apply(wb, &assignments).unwrap();
        IndexRewriter::apply(wb, &plan, &split, &renamed, before).unwrap()
    }

    #[test]
    fn test_rewrites_links_and_orders_sheets() {
        let mut wb = Workbook::new();
        wb.add_sheet("notes", grid(&[&["free text"]])).unwrap();
        wb.add_sheet(
            "Index",
            grid(&[
                &["Section", "Table Title", "Table_ID", "Link"],
                &["S", "B", "old", "→ 2"],
                &["S", "A", "old", "→ 1"],
                &["S", "A", "old", "→ 1"],
            ]),
        )
        .unwrap();
        wb.add_sheet(
            "1",
            grid(&[
                &["Table Title: A"],
                &["Source: s"],
                &["x"],
                &[""],
                &["Table Title: A"],
                &["Source: s"],
                &["y"],
            ]),
        )
        .unwrap();
        wb.add_sheet("2", grid(&[&["Table Title: B"], &["Source: s"], &["z"]]))
            .unwrap();

        let stats = run(&mut wb);

        assert_eq!(wb.sheet_names(), vec!["Index", "1", "2", "2_1", "notes"]);
        let index = wb.sheet_by_name("Index").unwrap();
        let link = |row: usize| index.grid.get(row, 3).map(ToString::to_string);
        assert_eq!(link(1).as_deref(), Some("→ 1"));
        assert_eq!(link(2).as_deref(), Some("→ 2"));
        assert_eq!(link(3).as_deref(), Some("→ 2_1"));
        assert_eq!(
            index.grid.get(3, 2).map(ToString::to_string).as_deref(),
            Some("2_1")
        );
        let target = index.links.get(&(3, 3)).copied();
        assert_eq!(target, wb.sheet_by_name("2_1").map(|s| s.id()));

        assert_eq!(stats.sheets_before, 4);
        assert_eq!(stats.sheets_after, 5);
        assert_eq!(stats.sheets_created, 1);
        assert_eq!(stats.blocks_detected, 3);
        assert!(stats.rename_conflicts.is_empty());
    }

    #[test]
    fn test_unresolved_entry_left_as_is() {
        let mut wb = Workbook::new();
        wb.add_sheet(
            "Index",
            grid(&[
                &["Section", "Table Title", "Link"],
                &["S", "A", "broken"],
                &["S", "B", "→ 1"],
            ]),
        )
        .unwrap();
        wb.add_sheet("1", grid(&[&["Table Title: B"], &["Source: s"], &["z"]]))
            .unwrap();

        let stats = run(&mut wb);

        let index = wb.sheet_by_name("Index").unwrap();
        assert_eq!(
            index.grid.get(1, 2).map(ToString::to_string).as_deref(),
            Some("broken")
        );
        assert!(index.links.get(&(1, 2)).is_none());
        assert_eq!(stats.unresolved_links, 1);
        assert_eq!(wb.sheet_names(), vec!["Index", "2"]);
    }
}
