use kassa_core::CategoryRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    StartsWith,
    #[default]
    Contains,
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchType::Exact),
            "starts_with" | "startswith" | "prefix" => Ok(MatchType::StartsWith),
            "contains" => Ok(MatchType::Contains),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

/// One row of the local pattern table. Table order is evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternEntry {
    pub fragment: String,
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(flatten)]
    pub target: CategoryRef,
    pub label: String,
}

impl PatternEntry {
    pub fn new(
        fragment: &str,
        match_type: MatchType,
        category_id: &str,
        sub_header_id: &str,
        label: &str,
    ) -> Self {
        Self {
            fragment: fragment.to_string(),
            match_type,
            target: CategoryRef::new(category_id, sub_header_id),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PatternTableError {
    #[error("Failed to parse pattern table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Pattern #{index} ('{label}') has a blank fragment")]
    BlankFragment { index: usize, label: String },
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default)]
    patterns: Vec<PatternEntry>,
}

/// Ordered, read-only list of merchant patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// A blank fragment would match every description under `Contains`, so it
    /// is rejected rather than silently swallowing the table.
    pub fn new(entries: Vec<PatternEntry>) -> Result<Self, PatternTableError> {
        if let Some(index) = entries.iter().position(|e| e.fragment.trim().is_empty()) {
            return Err(PatternTableError::BlankFragment {
                index,
                label: entries[index].label.clone(),
            });
        }
        Ok(Self { entries })
    }

    /// Parses `[[patterns]]` rows:
    ///
    /// ```toml
    /// [[patterns]]
    /// fragment = "ICA"
    /// match_type = "starts_with"
    /// category_id = "food"
    /// sub_header_id = "groceries"
    /// label = "ICA"
    /// ```
    pub fn from_toml(toml_content: &str) -> Result<Self, PatternTableError> {
        let file: PatternFile = toml::from_str(toml_content)?;
        Self::new(file.patterns)
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Common Swedish merchants and statement texts.
    pub fn builtin() -> Self {
        use MatchType::*;

        let entries = vec![
            PatternEntry::new("ICA", StartsWith, "food", "groceries", "ICA"),
            PatternEntry::new("COOP", StartsWith, "food", "groceries", "Coop"),
            PatternEntry::new("WILLYS", Contains, "food", "groceries", "Willys"),
            PatternEntry::new("HEMKÖP", Contains, "food", "groceries", "Hemköp"),
            PatternEntry::new("LIDL", Contains, "food", "groceries", "Lidl"),
            PatternEntry::new(
                "SYSTEMBOLAGET",
                Contains,
                "food",
                "alcohol",
                "Systembolaget",
            ),
            PatternEntry::new("SL ACCESS", Contains, "transport", "public", "SL"),
            PatternEntry::new(
                "STORSTOCKHOLMS LOKALTRAFIK",
                Contains,
                "transport",
                "public",
                "SL",
            ),
            PatternEntry::new("SJ AB", Contains, "transport", "train", "SJ"),
            PatternEntry::new("CIRCLE K", Contains, "transport", "fuel", "Circle K"),
            PatternEntry::new("SPOTIFY", Contains, "leisure", "streaming", "Spotify"),
            PatternEntry::new("NETFLIX", Contains, "leisure", "streaming", "Netflix"),
            PatternEntry::new("APOTEK", Contains, "health", "pharmacy", "Apotek"),
            PatternEntry::new("LÖN", Exact, "income", "salary", "Lön"),
            PatternEntry::new("SWISH", StartsWith, "transfers", "swish", "Swish"),
        ];
        Self { entries }
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::builtin()
    }
}
