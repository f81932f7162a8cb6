use std::time::Duration;

use futures_util::future::join_all;
use kassa_core::{CandidateSet, CategorizationOutcome, FeedbackStore, Money};
use serde::{Deserialize, Serialize};

use crate::classifier::RemoteClassifier;
use crate::config::BatchConfig;
use crate::engine::{CategorizeOptions, Categorizer};

/// Group size and inter-group pause for bulk categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub size: usize,
    pub pause: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            size: config.size.max(1),
            pause: Duration::from_millis(config.pause_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: i64,
    pub description: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub id: i64,
    pub outcome: CategorizationOutcome,
}

impl<S: FeedbackStore, C: RemoteClassifier> Categorizer<S, C> {
    /// Categorizes `items` in groups: concurrently within a group, groups one
    /// after another with a pause in between. Results keep input order.
    #[tracing::instrument(name = "categorize_batch", skip_all, fields(items = items.len()))]
    pub async fn categorize_batch(
        &self,
        items: &[BatchItem],
        candidates: &CandidateSet,
        options: CategorizeOptions,
    ) -> Vec<BatchResult> {
        let settings = self.batch_settings();
        let mut results = Vec::with_capacity(items.len());

        for (index, group) in items.chunks(settings.size.max(1)).enumerate() {
            if index > 0 && !settings.pause.is_zero() {
                tokio::time::sleep(settings.pause).await;
            }

            let outcomes = join_all(group.iter().map(|item| async move {
                let outcome = self
                    .categorize(&item.description, item.amount, candidates, options)
                    .await;
                BatchResult {
                    id: item.id,
                    outcome,
                }
            }))
            .await;

            tracing::debug!(group = index, size = group.len(), "batch group done");
            results.extend(outcomes);
        }

        let categorized = results
            .iter()
            .filter(|r| r.outcome.is_categorized())
            .count();
        tracing::info!(
            total = results.len(),
            categorized,
            "batch categorization finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ExternalClassifierAdapter;
    use crate::aliases::MerchantAliasTable;
    use crate::classifier::{MockBehavior, MockClassifier, RemoteSuggestion};
    use crate::history::HistoryLookup;
    use crate::matcher::LocalMatcher;
    use crate::memory::MemoryFeedbackStore;
    use crate::recorder::FeedbackRecorder;
    use kassa_core::{CategoryOption, Method, SubHeaderOption};
    use std::sync::Arc;
    use std::time::Instant;

    fn candidates() -> CandidateSet {
        CandidateSet::new(vec![CategoryOption {
            id: "food".into(),
            name: "Mat".into(),
            sub_headers: vec![SubHeaderOption::new("restaurants", "Restaurang")],
        }])
    }

    fn categorizer(
        mock: MockClassifier,
        settings: BatchSettings,
    ) -> Categorizer<MemoryFeedbackStore, MockClassifier> {
        let store = Arc::new(MemoryFeedbackStore::new());
        let history = HistoryLookup::new(store.clone(), MerchantAliasTable::builtin(), 3, 5);
        Categorizer::new(
            LocalMatcher::default(),
            ExternalClassifierAdapter::new(history, mock, Duration::from_secs(1)),
            FeedbackRecorder::new(store),
            settings,
        )
    }

    fn grouped(size: usize, pause_ms: u64) -> BatchSettings {
        BatchSettings::from(&BatchConfig { size, pause_ms })
    }

    fn items(descriptions: &[&str]) -> Vec<BatchItem> {
        descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| BatchItem {
                id: i as i64 + 1,
                description: d.to_string(),
                amount: Money::from_cents(-1000),
            })
            .collect()
    }

    #[tokio::test]
    async fn results_keep_input_order_and_mix_methods() {
        let c = categorizer(
            MockClassifier::suggesting("food", "restaurants"),
            grouped(2, 0),
        );
        let results = c
            .categorize_batch(
                &items(&["ICA NARA", "VAPIANO", "", "SPOTIFY P1", "MAX"]),
                &candidates(),
                CategorizeOptions::default(),
            )
            .await;

        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(results[0].outcome.method(), Method::LocalPattern);
        assert_eq!(results[1].outcome.method(), Method::Api);
        assert_eq!(results[2].outcome.method(), Method::Uncategorized);
        assert_eq!(results[3].outcome.method(), Method::LocalPattern);
        assert_eq!(c.adapter().classifier().calls(), 2);
    }

    #[tokio::test]
    async fn groups_run_concurrently_and_pause_between() {
        let delay = Duration::from_millis(200);
        let answer = RemoteSuggestion::new("food", "restaurants");
        let c = categorizer(
            MockClassifier::new(MockBehavior::Slow(delay, answer)),
            grouped(5, 50),
        );
        let descriptions: Vec<String> = (0..10).map(|i| format!("OKÄND {i}")).collect();
        let refs: Vec<&str> = descriptions.iter().map(String::as_str).collect();

        let started = Instant::now();
        let results = c
            .categorize_batch(&items(&refs), &candidates(), CategorizeOptions::default())
            .await;
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.outcome.method() == Method::Api));
        // Two groups of five concurrent calls plus one pause, not ten sequential calls.
        let floor = delay * 2 + Duration::from_millis(50);
        assert!(elapsed >= floor, "{elapsed:?}");
        assert!(elapsed < delay * 6, "{elapsed:?}");
    }

    #[tokio::test]
    async fn empty_input_returns_nothing() {
        let mock = MockClassifier::suggesting("food", "restaurants");
        let c = categorizer(mock, BatchSettings::default());
        let results = c
            .categorize_batch(&[], &candidates(), CategorizeOptions::default())
            .await;
        assert!(results.is_empty());
    }

    #[test]
    fn zero_size_config_is_clamped() {
        assert_eq!(grouped(0, 10).size, 1);
    }
}
