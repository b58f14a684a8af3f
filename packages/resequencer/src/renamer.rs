//! Two-phase sheet renaming.
//!
//! Sheet names must be unique at every step, so a direct rename of `1_1`
//! to `2` fails while another sheet still holds `2`. Every touched sheet is
//! first moved to a random temporary name; final names are assigned in a
//! second pass, in a fixed order.

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use crate::config::MAX_SHEET_NAME_LEN;
use crate::error::Result;
use crate::report::{RenameConflict, Warning, WarningKind};
use crate::workbook::{SheetId, Workbook};

/// Prefix of temporary sheet names.
pub const TEMP_NAME_PREFIX: char = '~';

/// A name no sheet of `workbook` uses.
#[must_use]
pub fn temp_sheet_name(workbook: &Workbook) -> String {
    loop {
        let token = Uuid::new_v4().simple().to_string();
        let name = format!("{TEMP_NAME_PREFIX}{}", &token[..16]);
        if !workbook.is_name_taken(&name) {
            return name;
        }
    }
}

/// `target` with a ` (n)` suffix, shortened to fit the sheet name limit.
fn suffixed(target: &str, n: usize) -> String {
    let suffix = format!(" ({n})");
    let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
    let base: String = target.chars().take(keep).collect();
    format!("{}{suffix}", base.trim_end())
}

/// Result of a rename run.
#[derive(Debug, Clone, Default)]
pub struct RenameOutcome {
    /// Final name per touched sheet.
    pub final_names: BTreeMap<SheetId, String>,
    pub conflicts: Vec<RenameConflict>,
    pub warnings: Vec<Warning>,
}

/// Applies target names to sheets without intermediate collisions.
pub struct SheetRenamer;

impl SheetRenamer {
    /// Rename each sheet in `assignments` to its target.
    ///
    /// Assignments are applied in the given order. A target already held by
    /// another sheet gets the first free ` (n)` suffix, starting at 2. Sheets
    /// not listed keep their names and count as taken.
    pub fn apply(
        workbook: &mut Workbook,
        assignments: &[(SheetId, String)],
    ) -> Result<RenameOutcome> {
        let mut outcome = RenameOutcome::default();

        let mut seen = HashSet::new();
        let assignments: Vec<&(SheetId, String)> = assignments
            .iter()
            .filter(|(id, target)| {
                let first = seen.insert(*id);
                if !first {
                    tracing::debug!(sheet = %id, wanted = %target, "ignoring repeated assignment");
                }
                first
            })
            .collect();

        // Phase 1: park every touched sheet under a temporary name
        for (id, _) in &assignments {
            let temp = temp_sheet_name(workbook);
            workbook.rename_sheet(*id, temp)?;
        }

        // Phase 2: final names
        for (id, target) in &assignments {
            let mut name = target.clone();
            let mut n = 2;
            while workbook.is_name_taken(&name) {
                name = suffixed(target, n);
                n += 1;
            }

            if name != *target {
                tracing::debug!(wanted = %target, resolved_as = %name, "rename conflict");
                outcome.conflicts.push(RenameConflict {
                    target: target.clone(),
                    resolved_as: name.clone(),
                });
                outcome.warnings.push(Warning::new(
                    WarningKind::RenameConflict,
                    format!("target '{target}' already taken, renamed to '{name}'"),
                ));
            }

            workbook.rename_sheet(*id, name.clone())?;
            outcome.final_names.insert(*id, name);
        }

        tracing::info!(
            renamed = outcome.final_names.len(),
            conflicts = outcome.conflicts.len(),
            "renamed sheets"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{names_equal, Grid};
    use pretty_assertions::assert_eq;

    fn workbook_with(names: &[&str]) -> (Workbook, Vec<SheetId>) {
        let mut wb = Workbook::new();
        let ids = names
            .iter()
            .map(|n| wb.add_sheet(*n, Grid::new()).unwrap())
            .collect();
        (wb, ids)
    }

    /// Replay the rename history and check names stay unique after every step.
    fn assert_unique_at_every_step(initial: &[&str], wb: &Workbook) {
        let mut names: Vec<(SheetId, String)> = wb
            .sheets()
            .map(|s| s.id())
            .zip(initial.iter().map(|n| n.to_string()))
            .collect();
        for record in wb.rename_history() {
            let slot = names.iter_mut().find(|(id, _)| *id == record.sheet).unwrap();
            assert_eq!(slot.1, record.from);
            slot.1 = record.to.clone();
            for (i, (_, a)) in names.iter().enumerate() {
                for (_, b) in names.iter().skip(i + 1) {
                    assert!(!names_equal(a, b), "duplicate name {a} after renaming");
                }
            }
        }
    }

    #[test]
    fn test_swap_names_without_collision() {
        let (mut wb, ids) = workbook_with(&["1", "2", "3"]);
        let outcome = SheetRenamer::apply(
            &mut wb,
            &[
                (ids[0], "3".to_string()),
                (ids[1], "1".to_string()),
                (ids[2], "2".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(wb.sheet_names(), vec!["3", "1", "2"]);
        assert!(outcome.conflicts.is_empty());
        assert_unique_at_every_step(&["1", "2", "3"], &wb);
    }

    #[test]
    fn test_duplicate_target_gets_suffix() {
        let (mut wb, ids) = workbook_with(&["Index", "4", "9"]);
        let outcome = SheetRenamer::apply(
            &mut wb,
            &[(ids[1], "7".to_string()), (ids[2], "7".to_string())],
        )
        .unwrap();

        assert_eq!(wb.sheet_names(), vec!["Index", "7", "7 (2)"]);
        assert_eq!(
            outcome.conflicts,
            vec![RenameConflict {
                target: "7".to_string(),
                resolved_as: "7 (2)".to_string(),
            }]
        );
        assert_eq!(outcome.warnings.len(), 1);
        assert_unique_at_every_step(&["Index", "4", "9"], &wb);
    }

    #[test]
    fn test_untouched_sheet_keeps_name_and_blocks_target() {
        let (mut wb, ids) = workbook_with(&["2", "notes"]);
        let outcome = SheetRenamer::apply(&mut wb, &[(ids[0], "Notes".to_string())]).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Notes (2)", "notes"]);
        assert_eq!(outcome.conflicts.len(), 1);
    }

    #[test]
    fn test_repeated_assignment_is_ignored() {
        let (mut wb, ids) = workbook_with(&["a"]);
        let outcome = SheetRenamer::apply(
            &mut wb,
            &[(ids[0], "1".to_string()), (ids[0], "2".to_string())],
        )
        .unwrap();
        assert_eq!(wb.sheet_names(), vec!["1"]);
        assert_eq!(outcome.final_names.get(&ids[0]).map(String::as_str), Some("1"));
    }

    #[test]
    fn test_suffix_respects_length_limit() {
        let long = "x".repeat(MAX_SHEET_NAME_LEN);
        let name = suffixed(&long, 12);
        assert_eq!(name.chars().count(), MAX_SHEET_NAME_LEN);
        assert!(name.ends_with(" (12)"));
    }

    #[test]
    fn test_temp_names_are_unique_and_valid() {
        let (wb, _) = workbook_with(&["1"]);
        let a = temp_sheet_name(&wb);
        let b = temp_sheet_name(&wb);
        assert_ne!(a, b);
        assert!(a.starts_with(TEMP_NAME_PREFIX));
        assert!(crate::workbook::validate_sheet_name(&a).is_ok());
    }
}
