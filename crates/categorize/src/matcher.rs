use kassa_core::normalize::normalize_description;
use kassa_core::{CategorizationOutcome, Method, Money};

use crate::patterns::{MatchType, PatternEntry, PatternTable};

/// Fixed confidence for a hit in the local pattern table.
pub const LOCAL_PATTERN_CONFIDENCE: f32 = 0.9;

/// Internal pairing of an entry with its pre-normalized fragment.
struct NormalizedEntry {
    entry: PatternEntry,
    fragment: String,
}

/// First-match-wins lookup over an injected [`PatternTable`].
pub struct LocalMatcher {
    entries: Vec<NormalizedEntry>,
}

impl LocalMatcher {
    pub fn new(table: PatternTable) -> Self {
        let entries = table
            .entries()
            .iter()
            .cloned()
            .map(|entry| NormalizedEntry {
                fragment: normalize_description(&entry.fragment),
                entry,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the earliest table entry matching `description`, never a
    /// "better" later one. Blank descriptions match nothing.
    pub fn find_match(&self, description: &str) -> Option<&PatternEntry> {
        let text = normalize_description(description);
        if text.is_empty() {
            return None;
        }

        let hit = self
            .entries
            .iter()
            .find(|ne| entry_matches(ne, &text))
            .map(|ne| &ne.entry);

        if let Some(entry) = hit {
            tracing::trace!(
                description = %text,
                rule = %entry.label,
                match_type = ?entry.match_type,
                "local pattern matched"
            );
        } else {
            tracing::trace!(description = %text, "no local pattern matched");
        }
        hit
    }

    /// Local-only categorization: a pattern hit yields `LocalPattern` at
    /// [`LOCAL_PATTERN_CONFIDENCE`], anything else `Uncategorized`.
    pub fn categorize_locally(&self, description: &str, amount: Money) -> CategorizationOutcome {
        match self.find_match(description) {
            Some(entry) => {
                tracing::debug!(
                    rule = %entry.label,
                    category_id = %entry.target.category_id,
                    sub_header_id = %entry.target.sub_header_id,
                    %amount,
                    confidence = LOCAL_PATTERN_CONFIDENCE,
                    "categorized by local pattern"
                );
                CategorizationOutcome::categorized(
                    entry.target.clone(),
                    LOCAL_PATTERN_CONFIDENCE,
                    Method::LocalPattern,
                )
            }
            None => CategorizationOutcome::uncategorized(),
        }
    }
}

impl Default for LocalMatcher {
    fn default() -> Self {
        Self::new(PatternTable::builtin())
    }
}

fn entry_matches(ne: &NormalizedEntry, text: &str) -> bool {
    match ne.entry.match_type {
        MatchType::Exact => text == ne.fragment,
        MatchType::StartsWith => text.starts_with(&ne.fragment),
        MatchType::Contains => text.contains(&ne.fragment),
    }
}
