//! Read-only planning phase.
//!
//! [`WorkbookPlan::build`] runs catalog parsing, block detection, grouping
//! and matching without touching the workbook. The mutating stages only
//! consume the finished plan.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::catalog::{IndexCatalog, IndexEntry};
use crate::config::ResequenceConfig;
use crate::detect::{BlockDetector, TableBlock};
use crate::error::Result;
use crate::grouping::{CanonicalId, GroupingAssigner};
use crate::matching::{BlockIndexMatcher, MatchKind, MatchStrategy};
use crate::report::{CountMismatch, Warning, WarningKind};
use crate::workbook::{SheetId, Workbook};

/// An entry, its block and where the block goes.
#[derive(Debug, Clone, Serialize)]
pub struct SheetMapping {
    pub entry_seq: usize,
    pub canonical_id: CanonicalId,
    pub block: TableBlock,
    pub kind: MatchKind,
    pub old_sheet_name: String,
    pub new_sheet_name: String,
}

/// Plan for one data sheet referenced by the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SheetPlan {
    pub sheet: SheetId,
    pub name: String,
    pub blocks: Vec<TableBlock>,
    /// Mappings in block order; the first one stays in the original sheet.
    pub mappings: Vec<SheetMapping>,
    pub orphans: Vec<TableBlock>,
    pub mismatch: Option<CountMismatch>,
}

impl SheetPlan {
    /// Whether the sheet is split into several output sheets.
    #[must_use]
    pub fn is_split(&self) -> bool {
        self.mappings.len() > 1
    }
}

/// The full read-only plan for one workbook.
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookPlan {
    pub index: IndexCatalog,
    /// Canonical id per entry, indexed by entry seq.
    pub canonical_ids: Vec<CanonicalId>,
    /// Referenced data sheets in workbook order.
    pub sheets: Vec<SheetPlan>,
    /// Data sheets no entry links to.
    pub untouched: Vec<SheetId>,
    pub warnings: Vec<Warning>,
    #[serde(skip)]
    entry_sheet: BTreeMap<usize, SheetId>,
    #[serde(skip)]
    sheet_entries: BTreeMap<SheetId, Vec<usize>>,
}

impl WorkbookPlan {
    /// Compute the plan for `workbook`.
    pub fn build<S: MatchStrategy>(
        workbook: &Workbook,
        config: &ResequenceConfig,
        strategy: S,
    ) -> Result<Self> {
        let index = IndexCatalog::parse(workbook, config)?;
        let canonical_ids = GroupingAssigner::assign(&index.entries);
        let detector = BlockDetector::new(config);
        let matcher = BlockIndexMatcher::new(strategy);

        let mut warnings = index.warnings.clone();
        let mut sheets = Vec::new();
        let mut untouched = Vec::new();

        for sheet in workbook.sheets() {
            if sheet.id() == index.sheet {
                continue;
            }
            let entries: Vec<&IndexEntry> = index.entries_for(sheet.id()).collect();
            if entries.is_empty() {
                tracing::debug!(sheet = %sheet.name(), "sheet not referenced by the index");
                untouched.push(sheet.id());
                continue;
            }

            let detection = detector.detect(sheet);
            warnings.extend(detection.warnings);

            let result = matcher.match_sheet(sheet.id(), sheet.name(), &entries, &detection.blocks);
            warnings.extend(result.warnings);

            let mut mappings: Vec<SheetMapping> = result
                .matches
                .into_iter()
                .map(|m| {
                    let canonical_id = canonical_ids[m.entry_seq];
                    SheetMapping {
                        entry_seq: m.entry_seq,
                        canonical_id,
                        block: m.block,
                        kind: m.kind,
                        old_sheet_name: sheet.name().to_string(),
                        new_sheet_name: canonical_id.sheet_name(),
                    }
                })
                .collect();
            mappings.sort_by_key(|m| m.block.seq);

            tracing::info!(
                sheet = %sheet.name(),
                entries = entries.len(),
                blocks = detection.blocks.len(),
                "planned sheet"
            );

            sheets.push(SheetPlan {
                sheet: sheet.id(),
                name: sheet.name().to_string(),
                blocks: detection.blocks,
                mappings,
                orphans: result.orphans,
                mismatch: result.mismatch,
            });
        }

        let mut plan = Self {
            index,
            canonical_ids,
            sheets,
            untouched,
            warnings,
            entry_sheet: BTreeMap::new(),
            sheet_entries: BTreeMap::new(),
        };
        plan.rebuild_lookups();
        let duplicates = plan.duplicate_targets();
        plan.warnings.extend(duplicates);
        Ok(plan)
    }

    fn rebuild_lookups(&mut self) {
        self.entry_sheet.clear();
        self.sheet_entries.clear();
        for sheet in &self.sheets {
            for m in &sheet.mappings {
                self.entry_sheet.insert(m.entry_seq, sheet.sheet);
                self.sheet_entries
                    .entry(sheet.sheet)
                    .or_default()
                    .push(m.entry_seq);
            }
        }
        for seqs in self.sheet_entries.values_mut() {
            seqs.sort_unstable();
        }
    }

    /// Target names used more than once.
    ///
    /// Grouping never produces duplicates; the renamer still copes if it does.
    fn duplicate_targets(&self) -> Vec<Warning> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for m in self.mappings() {
            *seen.entry(m.new_sheet_name.to_lowercase()).or_default() += 1;
        }
        let mut names: Vec<(String, usize)> = seen.into_iter().filter(|(_, n)| *n > 1).collect();
        names.sort();
        names
            .into_iter()
            .map(|(name, n)| {
                Warning::new(
                    WarningKind::RenameConflict,
                    format!("target name '{name}' planned for {n} sheets"),
                )
            })
            .collect()
    }

    /// All mappings, sheet by sheet.
    pub fn mappings(&self) -> impl Iterator<Item = &SheetMapping> {
        self.sheets.iter().flat_map(|s| s.mappings.iter())
    }

    /// Mapping of an entry, if the entry resolved to a sheet.
    #[must_use]
    pub fn mapping_for(&self, entry_seq: usize) -> Option<&SheetMapping> {
        let sheet = self.entry_sheet.get(&entry_seq)?;
        self.sheets
            .iter()
            .find(|s| s.sheet == *sheet)?
            .mappings
            .iter()
            .find(|m| m.entry_seq == entry_seq)
    }

    /// Entries whose blocks live in `sheet`, in catalog order.
    #[must_use]
    pub fn entries_for_sheet(&self, sheet: SheetId) -> &[usize] {
        self.sheet_entries.get(&sheet).map_or(&[], Vec::as_slice)
    }

    /// Number of blocks detected across referenced sheets.
    #[must_use]
    pub fn blocks_detected(&self) -> usize {
        self.sheets.iter().map(|s| s.blocks.len()).sum()
    }

    /// Number of new sheets splitting will create.
    #[must_use]
    pub fn splits(&self) -> usize {
        self.sheets
            .iter()
            .map(|s| s.mappings.len().saturating_sub(1))
            .sum()
    }

    /// Count mismatches per sheet.
    #[must_use]
    pub fn count_mismatches(&self) -> Vec<CountMismatch> {
        self.sheets
            .iter()
            .filter_map(|s| s.mismatch.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::GreedyBestMatch;
    use crate::workbook::{CellValue, Grid};
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|c| CellValue::text(*c)).collect())
                .collect(),
        )
    }

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_sheet(
            "Index",
            grid(&[
                &["Source", "PageNo", "Table_ID", "Location_ID", "Section", "Table Title", "Link"],
                &["AR", "1", "1", "", "S", "X", "→ 1"],
                &["AR", "1", "2", "", "S", "X", "→ 1"],
                &["AR", "2", "3", "", "S", "Y", "→ 1"],
                &["AR", "3", "4", "", "T", "Z", "→ 2"],
            ]),
        )
        .unwrap();
        wb.add_sheet(
            "1",
            grid(&[
                &["Table Title: X"],
                &["Source: p1"],
                &["a", "1"],
                &[""],
                &["Table Title: X"],
                &["b", "2"],
                &[""],
                &["Table Title: Y"],
                &["Source: p2"],
                &["c", "3"],
            ]),
        )
        .unwrap();
        wb.add_sheet("2", grid(&[&["only", "data"]])).unwrap();
        wb.add_sheet("notes", grid(&[&["free text"]])).unwrap();
        wb
    }

    #[test]
    fn test_plan_maps_every_entry() {
        let wb = sample();
        let plan = WorkbookPlan::build(&wb, &ResequenceConfig::default(), GreedyBestMatch).unwrap();

        assert_eq!(plan.sheets.len(), 2);
        assert_eq!(plan.untouched.len(), 1);
        assert_eq!(plan.blocks_detected(), 4);
        assert_eq!(plan.splits(), 2);

        let names: Vec<&str> = plan.mappings().map(|m| m.new_sheet_name.as_str()).collect();
        assert_eq!(names, vec!["1", "1_1", "2", "3"]);

        let second = plan.mapping_for(1).unwrap();
        assert!(!second.block.has_metadata);
        assert_eq!(second.kind, MatchKind::Positional);

        let sheet_one = plan.sheets[0].sheet;
        assert_eq!(plan.entries_for_sheet(sheet_one), &[0, 1, 2]);
        assert_eq!(plan.entries_for_sheet(plan.sheets[1].sheet), &[3]);
        assert!(plan.mapping_for(4).is_none());
    }

    #[test]
    fn test_plan_leaves_workbook_unchanged() {
        let wb = sample();
        let before = wb.sheet_names();
        let _plan = WorkbookPlan::build(&wb, &ResequenceConfig::default(), GreedyBestMatch).unwrap();
        assert_eq!(wb.sheet_names(), before);
        assert!(wb.rename_history().is_empty());
    }

    #[test]
    fn test_no_duplicate_target_warnings_for_grouped_ids() {
        let wb = sample();
        let plan = WorkbookPlan::build(&wb, &ResequenceConfig::default(), GreedyBestMatch).unwrap();
        assert!(plan
            .warnings
            .iter()
            .all(|w| w.kind != WarningKind::RenameConflict));
    }
}
