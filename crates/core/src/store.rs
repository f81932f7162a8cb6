use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::category::CategoryRef;
use crate::feedback::{FeedbackEntry, LearnedPattern};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Record store for categorization feedback and the learned-pattern index.
///
/// Writes are upserts so that retried deliveries are absorbed; concurrent
/// writers to the same key resolve last-write-wins inside the store.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    // ── Feedback ──

    /// Confirmed (`was_correct`) entry whose description equals `description`
    /// exactly (case-sensitive). Newest first if the backend holds several.
    async fn find_confirmed_feedback(
        &self,
        description: &str,
    ) -> Result<Option<FeedbackEntry>, StoreError>;

    /// Confirmed entries whose description contains `keyword`, ignoring case.
    async fn find_confirmed_feedback_containing(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>, StoreError>;

    /// Insert or overwrite the entry keyed by its exact description.
    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError>;

    // ── Learned patterns ──

    /// Patterns whose text contains `fragment` (case-insensitive), most frequent first.
    async fn find_learned_patterns(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<LearnedPattern>, StoreError>;

    /// Bump `frequency_count` for `(pattern_text, target)`, inserting it at 1
    /// when absent. Returns the row as stored.
    async fn increment_learned_pattern(
        &self,
        pattern_text: &str,
        target: &CategoryRef,
        at: DateTime<Utc>,
    ) -> Result<LearnedPattern, StoreError>;
}
