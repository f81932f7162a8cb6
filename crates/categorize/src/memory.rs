use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kassa_core::{CategoryRef, FeedbackEntry, FeedbackStore, LearnedPattern, StoreError};

#[derive(Default)]
struct Tables {
    feedback: Vec<FeedbackEntry>,
    patterns: Vec<LearnedPattern>,
}

// ── In-memory store (always available, used for tests) ───────────────────────

/// [`FeedbackStore`] kept in process memory. Can be switched into a failing
/// mode to exercise the engine's degrade paths.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call returns [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn feedback_entries(&self) -> Vec<FeedbackEntry> {
        self.lock().map(|t| t.feedback.clone()).unwrap_or_default()
    }

    pub fn learned_patterns(&self) -> Vec<LearnedPattern> {
        self.lock().map(|t| t.patterns.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| unavailable("memory store lock poisoned"))
    }

    fn check(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("memory store set to fail"));
        }
        self.lock()
    }
}

fn unavailable(reason: &str) -> StoreError {
    StoreError::Unavailable(reason.to_string())
}

/// Newest entries first, the order the SQL store returns.
fn newest_first(entries: &[FeedbackEntry]) -> Vec<&FeedbackEntry> {
    let mut sorted: Vec<&FeedbackEntry> = entries.iter().rev().collect();
    sorted.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    sorted
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn find_confirmed_feedback(
        &self,
        description: &str,
    ) -> Result<Option<FeedbackEntry>, StoreError> {
        let tables = self.check()?;
        Ok(newest_first(&tables.feedback)
            .into_iter()
            .find(|e| e.was_correct && e.description == description)
            .cloned())
    }

    async fn find_confirmed_feedback_containing(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>, StoreError> {
        let tables = self.check()?;
        let keyword = keyword.to_lowercase();
        Ok(newest_first(&tables.feedback)
            .into_iter()
            .filter(|e| e.was_correct)
            .filter(|e| e.description.to_lowercase().contains(&keyword))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        let mut tables = self.check()?;
        let feedback = &mut tables.feedback;
        feedback.retain(|e| e.description != entry.description);
        feedback.push(entry.clone());
        Ok(())
    }

    async fn find_learned_patterns(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<LearnedPattern>, StoreError> {
        let tables = self.check()?;
        let fragment = fragment.to_uppercase();
        let mut hits: Vec<LearnedPattern> = tables
            .patterns
            .iter()
            .filter(|p| p.pattern_text.contains(&fragment))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.frequency_count
                .cmp(&a.frequency_count)
                .then(b.last_updated.cmp(&a.last_updated))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn increment_learned_pattern(
        &self,
        pattern_text: &str,
        target: &CategoryRef,
        at: DateTime<Utc>,
    ) -> Result<LearnedPattern, StoreError> {
        let mut tables = self.check()?;
        let existing = tables
            .patterns
            .iter_mut()
            .find(|p| p.pattern_text == pattern_text && &p.target == target);
        if let Some(existing) = existing {
            existing.frequency_count = existing.frequency_count.saturating_add(1);
            existing.last_updated = at;
            return Ok(existing.clone());
        }

        let pattern = LearnedPattern {
            pattern_text: pattern_text.to_string(),
            target: target.clone(),
            frequency_count: 1,
            last_updated: at,
        };
        tables.patterns.push(pattern.clone());
        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kassa_core::Money;

    fn entry(description: &str, was_correct: bool) -> FeedbackEntry {
        FeedbackEntry {
            description: description.to_string(),
            amount: Money::from_cents(-100),
            target: CategoryRef::new("food", "groceries"),
            was_correct,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_one_entry_per_description() {
        let store = MemoryFeedbackStore::new();
        store.upsert_feedback(&entry("COOP", true)).await.unwrap();
        store.upsert_feedback(&entry("COOP", false)).await.unwrap();
        let entries = store.feedback_entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].was_correct);
    }

    #[tokio::test]
    async fn failing_mode_rejects_everything() {
        let store = MemoryFeedbackStore::new();
        store.set_failing(true);
        assert!(store.upsert_feedback(&entry("COOP", true)).await.is_err());
        assert!(store.find_confirmed_feedback("COOP").await.is_err());
        store.set_failing(false);
        assert!(store.upsert_feedback(&entry("COOP", true)).await.is_ok());
    }

    #[tokio::test]
    async fn increment_separates_targets() {
        let store = MemoryFeedbackStore::new();
        let a = CategoryRef::new("food", "groceries");
        let b = CategoryRef::new("food", "snacks");
        let now = Utc::now();
        let first = store.increment_learned_pattern("COOP", &a, now).await;
        let again = store.increment_learned_pattern("COOP", &a, now).await;
        let other = store.increment_learned_pattern("COOP", &b, now).await;
        assert_eq!(first.unwrap().frequency_count, 1);
        assert_eq!(again.unwrap().frequency_count, 2);
        assert_eq!(other.unwrap().frequency_count, 1);
        assert_eq!(store.learned_patterns().len(), 2);
    }
}
