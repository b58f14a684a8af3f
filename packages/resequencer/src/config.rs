//! Configuration constants, patterns and run settings.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ResequenceError, Result};

/// Default name of the catalog sheet.
pub const DEFAULT_INDEX_SHEET: &str = "Index";

/// Spreadsheet applications reject sheet names longer than this.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// How far below a title marker the source marker may appear.
pub const DEFAULT_SOURCE_WINDOW: usize = 3;

/// How far below a unit indicator the period header may appear.
pub const DEFAULT_UNIT_HEADER_WINDOW: usize = 3;

/// How many leading index rows are searched for the header row.
pub const INDEX_HEADER_SEARCH_ROWS: usize = 10;

/// Text of the back-navigation cell written at the top of each output sheet.
pub const DEFAULT_BACK_NAV_TEXT: &str = "← Back to Index";

/// Suffix appended to the input file stem for the output workbook.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_resequenced";

/// File extensions picked up when a directory is given as input.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls"];

/// Index link token: an arrow followed by an optional "Sheet" word and the sheet name.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
pub static LINK_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:→|->|=>|➜|➔|⇒)\s*(?:(?i:sheet)\s+)?(.+?)\s*$").expect("valid regex")
});

/// Back-navigation cell text, e.g. "← Back to Index" or "<- Index".
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
pub static BACK_NAV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:←|<-|<<|⇐)\s*(?:back\s+to\s+)?(?:the\s+)?index\b").expect("valid regex")
});

/// Currency / scale indicator line, e.g. "(₹ in crore)", "USD millions", "Rs. in Lakhs".
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
pub static UNIT_INDICATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^[\(\[]?\s*
        (?:(?:all\s+)?(?:amounts?|figures|values?)\s+)?
        (?:in\s+)?
        (?:(?:₹|\$|€|£|rs\.?|inr|usd|us\$|eur|gbp)\s*)?
        (?:in\s+)?
        (?:(?:₹|\$|€|£|rs\.?|inr|usd|us\$|eur|gbp)\s*)?
        (?:'000s?|000s|thousands?|millions?|billions?|crores?|lakhs?|lacs?|mn|bn|cr\.?)
        (?:\b|$)",
    )
    .expect("valid regex")
});

/// Period / date column header token, e.g. "FY24", "Q1 2023", "Mar-24", "2023-24".
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
pub static PERIOD_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*(?:
            fy\s*'?\d{2,4}(?:\s*[-/]\s*\d{2,4})?
          | (?:q[1-4]|h[12])(?:\s*fy)?\s*'?\d{0,4}
          | (?:19|20)\d{2}(?:\s*[-/]\s*\d{2,4})?
          | (?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?[\s\-,']*(?:\d{1,2},?\s*)?'?\d{2,4}
          | \d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}
          | (?:as\s+(?:at|on|of)|year\s+ended|quarter\s+ended|period\s+ended)\b.*
        )\s*$",
    )
    .expect("valid regex")
});

/// Marker prefixes recognised in the first column of data sheets.
///
/// Each list is matched case-insensitively as a prefix; the first entry of
/// each list is the form written when metadata has to be synthesized.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerPrefixes {
    pub category: Vec<String>,
    pub line_items: Vec<String>,
    pub product_entity: Vec<String>,
    pub column_header: Vec<String>,
    pub title: Vec<String>,
    pub source: Vec<String>,
}

impl Default for MarkerPrefixes {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }
        Self {
            category: list(&["Category (Parent):", "Category/Parent:", "Category:"]),
            line_items: list(&["Line Items:", "Line Item:"]),
            product_entity: list(&["Product/Entity:", "Entity:", "Product:"]),
            column_header: list(&["Column Header:", "Column Headers:"]),
            title: list(&["Table Title:", "Title:"]),
            source: list(&["Source:"]),
        }
    }
}

/// Output format of the statistics reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Yaml,
}

impl ReportFormat {
    /// File extension used for reports in this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Settings for one resequencing run.
#[derive(Debug, Clone, Serialize)]
pub struct ResequenceConfig {
    /// Preferred name of the index sheet (case-insensitive).
    pub index_sheet: String,
    pub markers: MarkerPrefixes,
    pub source_window: usize,
    pub unit_header_window: usize,
    pub back_nav_text: String,
    pub output_suffix: String,
    pub report_format: ReportFormat,
    /// Worker threads for batch runs; `0` lets rayon decide.
    pub jobs: usize,
}

impl Default for ResequenceConfig {
    fn default() -> Self {
        Self {
            index_sheet: DEFAULT_INDEX_SHEET.to_string(),
            markers: MarkerPrefixes::default(),
            source_window: DEFAULT_SOURCE_WINDOW,
            unit_header_window: DEFAULT_UNIT_HEADER_WINDOW,
            back_nav_text: DEFAULT_BACK_NAV_TEXT.to_string(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            report_format: ReportFormat::default(),
            jobs: 0,
        }
    }
}

impl ResequenceConfig {
    /// Defaults overridden by `RESEQUENCE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("RESEQUENCE_INDEX_SHEET") {
            config.index_sheet = name;
        }
        if let Some(window) = env_usize("RESEQUENCE_SOURCE_WINDOW")? {
            config.source_window = window;
        }
        if let Some(window) = env_usize("RESEQUENCE_UNIT_HEADER_WINDOW")? {
            config.unit_header_window = window;
        }
        if let Some(jobs) = env_usize("RESEQUENCE_JOBS")? {
            config.jobs = jobs;
        }
        if let Ok(suffix) = std::env::var("RESEQUENCE_OUTPUT_SUFFIX") {
            config.output_suffix = suffix;
        }

        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_index_sheet(mut self, name: impl Into<String>) -> Self {
        self.index_sheet = name.into();
        self
    }

    #[must_use]
    pub fn with_source_window(mut self, window: usize) -> Self {
        self.source_window = window;
        self
    }

    #[must_use]
    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.index_sheet.trim().is_empty() {
            return Err(ResequenceError::InvalidConfig(
                "index sheet name must not be empty".to_string(),
            ));
        }
        if self.source_window == 0 {
            return Err(ResequenceError::InvalidConfig(
                "source window must be at least 1".to_string(),
            ));
        }
        if self.back_nav_text.trim().is_empty() {
            return Err(ResequenceError::InvalidConfig(
                "back-navigation text must not be empty".to_string(),
            ));
        }
        let m = &self.markers;
        for (kind, prefixes) in [
            ("category", &m.category),
            ("line items", &m.line_items),
            ("product/entity", &m.product_entity),
            ("column header", &m.column_header),
            ("title", &m.title),
            ("source", &m.source),
        ] {
            if prefixes.iter().all(|p| p.trim().is_empty()) {
                return Err(ResequenceError::InvalidConfig(format!(
                    "no {kind} marker prefix configured"
                )));
            }
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ResequenceError::InvalidConfig(format!("{key}={value} is not a number"))),
        Err(_) => Ok(None),
    }
}

/// Whether `text` looks like a currency / scale indicator line.
#[must_use]
pub fn is_unit_indicator(text: &str) -> bool {
    let text = text.trim();
    // long sentences that mention "millions" are narrative, not indicators
    text.chars().count() <= 60 && UNIT_INDICATOR_PATTERN.is_match(text)
}

/// Whether `text` looks like a period / date column header.
#[must_use]
pub fn is_period_token(text: &str) -> bool {
    PERIOD_TOKEN_PATTERN.is_match(text)
}

/// Extract the sheet name from an index link token such as `→ 12`.
#[must_use]
pub fn parse_link_token(text: &str) -> Option<String> {
    LINK_TOKEN_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_token() {
        assert_eq!(parse_link_token("→ 12"), Some("12".to_string()));
        assert_eq!(parse_link_token("->3"), Some("3".to_string()));
        assert_eq!(parse_link_token("→ Sheet 4"), Some("4".to_string()));
        assert_eq!(parse_link_token("  ➜ 7_1 "), Some("7_1".to_string()));
        assert_eq!(parse_link_token("12"), None);
        assert_eq!(parse_link_token("→ "), None);
        assert_eq!(parse_link_token(""), None);
    }

    #[test]
    fn test_unit_indicators() {
        assert!(is_unit_indicator("(₹ in crore)"));
        assert!(is_unit_indicator("Rs. in Lakhs"));
        assert!(is_unit_indicator("USD millions"));
        assert!(is_unit_indicator("Amount in ₹ crore"));
        assert!(is_unit_indicator("(in thousands)"));
        assert!(is_unit_indicator("All figures in USD mn"));

        assert!(!is_unit_indicator("Revenue from operations"));
        assert!(!is_unit_indicator("Crop yield"));
        assert!(!is_unit_indicator(
            "Total revenue grew to several millions of units over the reporting period under review"
        ));
    }

    #[test]
    fn test_period_tokens() {
        for token in [
            "FY24",
            "FY 2023-24",
            "Q1 2023",
            "Q3FY24",
            "H1 2024",
            "2023",
            "2023-24",
            "Mar-24",
            "March 31, 2024",
            "31/03/2024",
            "As at 31 March 2024",
            "Year ended March 2024",
        ] {
            assert!(is_period_token(token), "expected period token: {token}");
        }

        for token in ["Particulars", "Revenue", "Total", "123.45", "Notes"] {
            assert!(!is_period_token(token), "unexpected period token: {token}");
        }
    }

    #[test]
    fn test_back_nav_pattern() {
        assert!(BACK_NAV_PATTERN.is_match("← Back to Index"));
        assert!(BACK_NAV_PATTERN.is_match("<- index"));
        assert!(!BACK_NAV_PATTERN.is_match("Index of prices"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ResequenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ResequenceConfig::default().with_source_window(0);
        assert!(config.validate().is_err());

        let config = ResequenceConfig::default().with_index_sheet("  ");
        assert!(config.validate().is_err());

        let mut config = ResequenceConfig::default();
        config.markers.title.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_report_format_extension() {
        assert_eq!(ReportFormat::Json.extension(), "json");
        assert_eq!(ReportFormat::Yaml.extension(), "yaml");
    }
}
