//! Marker-line classification for data sheet rows.

use crate::config::{is_period_token, is_unit_indicator, MarkerPrefixes, BACK_NAV_PATTERN};
use crate::workbook::{CellValue, Grid};

/// Kind of structural marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    CategoryParent,
    LineItems,
    ProductEntity,
    ColumnHeader,
    Title,
    Source,
}

impl MarkerKind {
    /// Lines that may sit above a title as part of its metadata block.
    #[must_use]
    pub fn is_metadata_prefix(&self) -> bool {
        matches!(
            self,
            Self::CategoryParent | Self::LineItems | Self::ProductEntity | Self::ColumnHeader
        )
    }
}

/// A classified marker line and the value it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLine {
    pub kind: MarkerKind,
    pub value: String,
}

/// Registry of marker prefixes, checked in registration order.
///
/// Longer prefixes are registered before shorter overlapping ones so that
/// "Category (Parent):" wins over "Category:".
pub struct MarkerRegistry {
    prefixes: Vec<(String, MarkerKind)>,
}

impl MarkerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    /// Register a prefix for a marker kind.
    pub fn register(&mut self, prefix: impl Into<String>, kind: MarkerKind) {
        let prefix = prefix.into().trim().to_string();
        if prefix.is_empty() {
            return;
        }
        self.prefixes.push((prefix, kind));
        // stable: equal lengths keep registration order
        self.prefixes
            .sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    }

    /// Classify a first-column text as a marker line.
    #[must_use]
    pub fn classify_text(&self, text: &str) -> Option<(MarkerKind, String)> {
        let text = text.trim();
        self.prefixes.iter().find_map(|(prefix, kind)| {
            strip_prefix_ignore_case(text, prefix).map(|rest| {
                let value = rest.trim_start_matches(':').trim().to_string();
                (*kind, value)
            })
        })
    }

    /// Classify a grid row by its first column.
    ///
    /// When the marker cell carries no value after the prefix, the value is
    /// taken from the next non-blank cell of the row.
    #[must_use]
    pub fn classify_row(&self, grid: &Grid, row: usize) -> Option<MarkerLine> {
        let text = grid.first_text(row)?;
        let (kind, mut value) = self.classify_text(text)?;
        if value.is_empty() {
            value = grid
                .row(row)
                .iter()
                .skip(1)
                .find(|c| !c.is_blank())
                .map(|c| c.to_string().trim().to_string())
                .unwrap_or_default();
        }
        Some(MarkerLine { kind, value })
    }
}

impl Default for MarkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a registry from configured prefix lists.
#[must_use]
pub fn create_marker_registry(prefixes: &MarkerPrefixes) -> MarkerRegistry {
    let mut registry = MarkerRegistry::new();
    let groups = [
        (&prefixes.category, MarkerKind::CategoryParent),
        (&prefixes.line_items, MarkerKind::LineItems),
        (&prefixes.product_entity, MarkerKind::ProductEntity),
        (&prefixes.column_header, MarkerKind::ColumnHeader),
        (&prefixes.title, MarkerKind::Title),
        (&prefixes.source, MarkerKind::Source),
    ];
    for (list, kind) in groups {
        for prefix in list {
            registry.register(prefix.clone(), kind);
        }
    }
    registry
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.to_lowercase() == prefix.to_lowercase() {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Whether the row is a back-navigation cell (never table content).
#[must_use]
pub fn is_back_nav_row(grid: &Grid, row: usize, back_nav_text: &str) -> bool {
    grid.first_text(row).is_some_and(|text| {
        text.eq_ignore_ascii_case(back_nav_text.trim()) || BACK_NAV_PATTERN.is_match(text)
    })
}

/// Whether any of the first two cells of the row is a unit indicator.
#[must_use]
pub fn is_unit_indicator_row(grid: &Grid, row: usize) -> bool {
    grid.row(row)
        .iter()
        .take(2)
        .filter_map(CellValue::as_text)
        .any(is_unit_indicator)
}

/// Whether the row carries at least one period / date header token.
///
/// Integral numbers between 1900 and 2100 count as year headers, since
/// extraction often leaves year columns as numbers.
#[must_use]
pub fn is_period_header_row(grid: &Grid, row: usize) -> bool {
    grid.row(row).iter().any(|cell| match cell {
        CellValue::Text(text) => is_period_token(text),
        CellValue::Number(n) => n.fract() == 0.0 && (1900.0..=2100.0).contains(n),
        CellValue::Date(_) => true,
        CellValue::Empty => false,
    })
}
