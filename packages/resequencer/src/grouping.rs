//! Canonical id assignment for catalog entries.
//!
//! Entries are grouped on their normalized (Section, Title) pair. The first
//! entry of each group gets the next sequential base id; every repeat gets
//! `base_n` with `n` counting from 1.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::catalog::IndexEntry;

/// Canonical sheet identifier: `7` or `7_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalId {
    pub base: u32,
    pub sub: Option<u32>,
}

impl CanonicalId {
    #[must_use]
    pub fn base(base: u32) -> Self {
        Self { base, sub: None }
    }

    #[must_use]
    pub fn sub(base: u32, sub: u32) -> Self {
        Self {
            base,
            sub: Some(sub),
        }
    }

    /// Sheet name for this id.
    #[must_use]
    pub fn sheet_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub {
            Some(sub) => write!(f, "{}_{}", self.base, sub),
            None => write!(f, "{}", self.base),
        }
    }
}

impl Serialize for CanonicalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lowercase, trim and collapse internal whitespace.
#[must_use]
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Composite grouping key of an entry.
#[must_use]
pub fn grouping_key(section: &str, title: &str) -> String {
    format!("{}::{}", normalize_key(section), normalize_key(title))
}

#[derive(Debug, Clone, Copy)]
struct Group {
    base: u32,
    repeats: u32,
}

/// Assigns canonical ids in catalog order.
#[derive(Debug)]
pub struct GroupingAssigner {
    groups: HashMap<String, Group>,
    next_base: u32,
}

impl GroupingAssigner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
            next_base: 1,
        }
    }

    /// Id for the next entry with this section and title.
    pub fn next_id(&mut self, section: &str, title: &str) -> CanonicalId {
        let key = grouping_key(section, title);
        if let Some(group) = self.groups.get_mut(&key) {
            group.repeats += 1;
            return CanonicalId::sub(group.base, group.repeats);
        }

        let base = self.next_base;
        self.next_base += 1;
        self.groups.insert(key, Group { base, repeats: 0 });
        CanonicalId::base(base)
    }

    /// Ids for `entries`, indexed like the slice.
    #[must_use]
    pub fn assign(entries: &[IndexEntry]) -> Vec<CanonicalId> {
        let mut assigner = Self::new();
        let ids: Vec<CanonicalId> = entries
            .iter()
            .map(|e| assigner.next_id(&e.section, &e.title))
            .collect();
        tracing::debug!(
            entries = ids.len(),
            groups = assigner.groups.len(),
            "assigned canonical ids"
        );
        ids
    }
}

impl Default for GroupingAssigner {
    fn default() -> Self {
        Self::new()
    }
}
