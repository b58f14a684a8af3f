//! Pairing of detected blocks with the catalog entries of a sheet.

use serde::Serialize;

use crate::catalog::IndexEntry;
use crate::detect::TableBlock;
use crate::report::{CountMismatch, Warning, WarningKind};
use crate::workbook::SheetId;

/// How an entry found its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The only remaining block with the entry's title.
    Title,
    /// Same title as several blocks, paired by order of appearance.
    Positional,
    /// Paired by remaining order, titles ignored.
    Fallback,
    /// No block left; an empty placeholder was created.
    Placeholder,
}

/// One pairing produced by a strategy, as indexes into its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub entry: usize,
    pub block: usize,
    pub kind: MatchKind,
}

/// Trait for block/entry pairing strategies.
///
/// A strategy returns at most one pairing per entry and per block;
/// whatever it leaves unpaired is handled by [`BlockIndexMatcher`].
pub trait MatchStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Pair `entries` (catalog order) with `blocks` (detection order).
    fn pair(&self, entries: &[&IndexEntry], blocks: &[TableBlock]) -> Vec<Pairing>;
}

/// Title first, then appearance order among equal titles, then plain order.
///
/// Both the catalog and the detector list a sheet's tables top to bottom, so
/// order of appearance breaks ties between identical titles.
pub struct GreedyBestMatch;

impl MatchStrategy for GreedyBestMatch {
    fn name(&self) -> &'static str {
        "greedy-best-match"
    }

    fn pair(&self, entries: &[&IndexEntry], blocks: &[TableBlock]) -> Vec<Pairing> {
        let mut entry_open = vec![true; entries.len()];
        let mut block_open = vec![true; blocks.len()];
        let mut pairings = Vec::new();

        let entry_title = |i: usize| Some(entries[i].title.trim()).filter(|t| !t.is_empty());

        let mut take = |e: usize,
                        b: usize,
                        kind: MatchKind,
                        entry_open: &mut [bool],
                        block_open: &mut [bool]| {
            entry_open[e] = false;
            block_open[b] = false;
            pairings.push(Pairing {
                entry: e,
                block: b,
                kind,
            });
        };

        // Exact title, exactly one candidate
        for e in 0..entries.len() {
            let Some(title) = entry_title(e) else {
                continue;
            };
            let mut candidates = (0..blocks.len())
                .filter(|&b| block_open[b] && blocks[b].title_text() == Some(title));
            if let (Some(b), None) = (candidates.next(), candidates.next()) {
                take(e, b, MatchKind::Title, &mut entry_open, &mut block_open);
            }
        }

        // Shared titles, in order of appearance
        for e in 0..entries.len() {
            if !entry_open[e] {
                continue;
            }
            let Some(title) = entry_title(e) else {
                continue;
            };
            if let Some(b) =
                (0..blocks.len()).find(|&b| block_open[b] && blocks[b].title_text() == Some(title))
            {
                take(e, b, MatchKind::Positional, &mut entry_open, &mut block_open);
            }
        }

        // Whatever is left, by order
        let rest_entries: Vec<usize> = (0..entries.len()).filter(|&e| entry_open[e]).collect();
        let rest_blocks: Vec<usize> = (0..blocks.len()).filter(|&b| block_open[b]).collect();
        for (&e, &b) in rest_entries.iter().zip(&rest_blocks) {
            take(e, b, MatchKind::Fallback, &mut entry_open, &mut block_open);
        }

        pairings
    }
}

/// A block assigned to a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockMatch {
    pub entry_seq: usize,
    pub block: TableBlock,
    pub kind: MatchKind,
}

/// Matching result for one sheet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SheetMatch {
    /// One match per entry, in catalog order.
    pub matches: Vec<BlockMatch>,
    /// Detected blocks no entry claimed.
    pub orphans: Vec<TableBlock>,
    pub mismatch: Option<CountMismatch>,
    #[serde(skip)]
    pub warnings: Vec<Warning>,
}

/// Applies a [`MatchStrategy`] per sheet and completes its result.
pub struct BlockIndexMatcher<S: MatchStrategy> {
    strategy: S,
}

impl<S: MatchStrategy> BlockIndexMatcher<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    /// Match the blocks of one sheet against the entries linking to it.
    ///
    /// Every entry ends up with exactly one block: surplus entries get
    /// empty placeholder blocks. Surplus blocks are returned as orphans.
    pub fn match_sheet(
        &self,
        sheet: SheetId,
        sheet_name: &str,
        entries: &[&IndexEntry],
        blocks: &[TableBlock],
    ) -> SheetMatch {
        let pairings = self.strategy.pair(entries, blocks);

        let mut by_entry: Vec<Option<(usize, MatchKind)>> = vec![None; entries.len()];
        let mut claimed = vec![false; blocks.len()];
        for p in pairings {
            let free = by_entry.get(p.entry).is_some_and(Option::is_none)
                && claimed.get(p.block).is_some_and(|c| !c);
            if free {
                by_entry[p.entry] = Some((p.block, p.kind));
                claimed[p.block] = true;
            }
        }

        let mut result = SheetMatch::default();
        let mut next_placeholder = blocks.len();
        for (i, entry) in entries.iter().enumerate() {
            let (block, kind) = match by_entry[i] {
                Some((b, kind)) => (blocks[b].clone(), kind),
                None => {
                    let seq = next_placeholder;
                    next_placeholder += 1;
                    (TableBlock::placeholder(seq, sheet), MatchKind::Placeholder)
                }
            };
            tracing::debug!(
                sheet = %sheet_name,
                entry = entry.seq,
                block = block.seq,
                kind = ?kind,
                strategy = self.strategy.name(),
                "matched block"
            );
            result.matches.push(BlockMatch {
                entry_seq: entry.seq,
                block,
                kind,
            });
        }

        result.orphans = blocks
            .iter()
            .zip(&claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(b, _)| b.clone())
            .collect();

        if blocks.len() != entries.len() {
            result.mismatch = Some(CountMismatch {
                sheet: sheet_name.to_string(),
                blocks: blocks.len(),
                entries: entries.len(),
            });
            result.warnings.push(
                Warning::new(
                    WarningKind::CountMismatch,
                    format!(
                        "{} blocks detected for {} index entries",
                        blocks.len(),
                        entries.len()
                    ),
                )
                .with_sheet(sheet_name),
            );
        }

        result
    }
}
