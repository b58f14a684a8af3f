//! Table block detection.
//!
//! A data sheet holds one or more logical tables stacked vertically. Each
//! table is usually introduced by a metadata block of marker lines
//! ("Category (Parent):", "Table Title:", "Source:" ...). Sheets without
//! title markers fall back to unit-indicator lines, and sheets without any
//! recognisable structure become a single block.

mod engine;
mod markers;
mod types;

pub use engine::BlockDetector;
pub use markers::{
    create_marker_registry, is_back_nav_row, is_period_header_row, is_unit_indicator_row,
    MarkerKind, MarkerLine, MarkerRegistry,
};
pub use types::{BlockOrigin, Detection, TableBlock};
