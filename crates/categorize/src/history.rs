use std::collections::HashSet;
use std::sync::Arc;

use kassa_core::normalize::{description_keywords, first_word};
use kassa_core::{CandidateSet, CategoryRef, FeedbackEntry, FeedbackStore, Money};
use serde::{Deserialize, Serialize};

use crate::aliases::MerchantAliasTable;
use crate::suggestion::{Suggestion, SuggestionSource, EXACT_HISTORY_CONFIDENCE};

/// How many learned patterns to pull when looking for one inside the candidate set.
const LEARNED_LOOKUP_LIMIT: usize = 5;

/// A past confirmed categorization handed to the remote classifier as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalExample {
    pub description: String,
    pub amount: Money,
    pub target: CategoryRef,
}

impl From<FeedbackEntry> for HistoricalExample {
    fn from(entry: FeedbackEntry) -> Self {
        Self {
            description: entry.description,
            amount: entry.amount,
            target: entry.target,
        }
    }
}

/// What the feedback history says about a description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFindings {
    /// Exact or learned-pattern match; when present the remote call is skipped.
    pub definitive: Option<Suggestion>,
    /// Context for the remote classifier. Empty when `definitive` is set.
    pub examples: Vec<HistoricalExample>,
}

impl HistoryFindings {
    fn settled(suggestion: Suggestion) -> Self {
        Self {
            definitive: Some(suggestion),
            examples: Vec::new(),
        }
    }
}

/// Pre-check run before the remote classifier.
///
/// Order: exact confirmed description, then the learned-pattern index, then
/// keyword-matched examples. Store failures degrade to "nothing found".
pub struct HistoryLookup<S> {
    store: Arc<S>,
    aliases: MerchantAliasTable,
    keyword_limit: usize,
    max_examples: usize,
}

impl<S: FeedbackStore> HistoryLookup<S> {
    pub fn new(
        store: Arc<S>,
        aliases: MerchantAliasTable,
        keyword_limit: usize,
        max_examples: usize,
    ) -> Self {
        Self {
            store,
            aliases,
            keyword_limit,
            max_examples,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn find_historical_match(
        &self,
        description: &str,
        candidates: &CandidateSet,
    ) -> HistoryFindings {
        if let Some(s) = self.exact_match(description, candidates).await {
            return HistoryFindings::settled(s);
        }
        if let Some(s) = self.learned_match(description, candidates).await {
            return HistoryFindings::settled(s);
        }
        HistoryFindings {
            definitive: None,
            examples: self.contextual_examples(description).await,
        }
    }

    async fn exact_match(
        &self,
        description: &str,
        candidates: &CandidateSet,
    ) -> Option<Suggestion> {
        let entry = match self.store.find_confirmed_feedback(description).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(error = %e, "exact feedback lookup failed");
                return None;
            }
        };

        if !candidates.contains(&entry.target) {
            tracing::debug!(
                category = %entry.target,
                "confirmed feedback points outside the candidate set; ignoring"
            );
            return None;
        }

        tracing::debug!(category = %entry.target, "exact feedback match");
        Some(Suggestion::new(
            entry.target,
            EXACT_HISTORY_CONFIDENCE,
            SuggestionSource::ExactHistory,
        ))
    }

    /// The most frequent learned pattern whose category is a candidate. A
    /// more frequent pattern outside the candidate set is passed over.
    async fn learned_match(
        &self,
        description: &str,
        candidates: &CandidateSet,
    ) -> Option<Suggestion> {
        let word = first_word(description)?;

        let lookup = self
            .store
            .find_learned_patterns(&word, LEARNED_LOOKUP_LIMIT)
            .await;
        let patterns = match lookup {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(error = %e, "learned pattern lookup failed");
                return None;
            }
        };

        let best = patterns
            .into_iter()
            .find(|p| candidates.contains(&p.target))?;
        let confidence = best.confidence();
        tracing::debug!(
            pattern = %best.pattern_text,
            frequency = best.frequency_count,
            confidence,
            "learned pattern match"
        );
        Some(Suggestion::new(
            best.target,
            confidence,
            SuggestionSource::LearnedPattern,
        ))
    }

    /// Keywords from the description's first words plus merchant aliases.
    pub fn keywords(&self, description: &str) -> Vec<String> {
        let mut keywords = description_keywords(description);
        for keyword in self.aliases.keywords_for(description) {
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        keywords
    }

    /// At most one example per category pair, capped at `max_examples`.
    async fn contextual_examples(&self, description: &str) -> Vec<HistoricalExample> {
        let mut found: Vec<FeedbackEntry> = Vec::new();
        for keyword in self.keywords(description) {
            let lookup = self
                .store
                .find_confirmed_feedback_containing(&keyword, self.keyword_limit)
                .await;
            match lookup {
                Ok(entries) => found.extend(entries),
                Err(e) => tracing::warn!(%keyword, error = %e, "keyword feedback lookup failed"),
            }
        }

        let mut seen: HashSet<CategoryRef> = HashSet::new();
        let examples: Vec<HistoricalExample> = found
            .into_iter()
            .filter(|entry| seen.insert(entry.target.clone()))
            .take(self.max_examples)
            .map(HistoricalExample::from)
            .collect();

        tracing::debug!(count = examples.len(), "collected historical examples");
        examples
    }
}
