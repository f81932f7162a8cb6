use std::sync::Arc;

use chrono::Utc;
use kassa_core::normalize::pattern_text;
use kassa_core::{CategoryRef, FeedbackEntry, FeedbackStore, Money};

/// Stores human confirmations and corrections after the fact.
pub struct FeedbackRecorder<S> {
    store: Arc<S>,
}

impl<S: FeedbackStore> FeedbackRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Upserts the feedback row keyed by `description`; confirmed feedback
    /// also bumps the learned pattern for the merchant prefix. Write failures
    /// are logged, never returned: the user action this follows already succeeded.
    #[tracing::instrument(name = "record_feedback", skip(self, amount))]
    pub async fn record_feedback(
        &self,
        description: &str,
        amount: Money,
        category_id: &str,
        sub_header_id: &str,
        was_correct: bool,
    ) {
        let now = Utc::now();
        let target = CategoryRef::new(category_id, sub_header_id);
        let entry = FeedbackEntry {
            description: description.to_string(),
            amount,
            target: target.clone(),
            was_correct,
            recorded_at: now,
        };

        if let Err(e) = self.store.upsert_feedback(&entry).await {
            tracing::warn!(error = %e, "failed to store feedback");
        }

        if !was_correct {
            return;
        }

        let Some(pattern) = pattern_text(description) else {
            tracing::debug!("no pattern text in blank description");
            return;
        };

        let learned = self
            .store
            .increment_learned_pattern(&pattern, &target, now)
            .await;
        match learned {
            Ok(learned) => tracing::debug!(
                pattern = %learned.pattern_text,
                frequency = learned.frequency_count,
                "learned pattern updated"
            ),
            Err(e) => tracing::warn!(%pattern, error = %e, "failed to update learned pattern"),
        }
    }
}
