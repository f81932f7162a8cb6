use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kassa_core::{CategoryRef, FeedbackEntry, FeedbackStore, LearnedPattern, StoreError};

use crate::db::{self, DbPool};

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// [`FeedbackStore`] backed by the SQLite ledger database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl FeedbackStore for SqliteStore {
    async fn find_confirmed_feedback(
        &self,
        description: &str,
    ) -> Result<Option<FeedbackEntry>, StoreError> {
        db::find_confirmed_feedback(&self.pool, description)
            .await
            .map_err(db_err)
    }

    async fn find_confirmed_feedback_containing(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<FeedbackEntry>, StoreError> {
        db::find_confirmed_feedback_containing(&self.pool, keyword, limit)
            .await
            .map_err(db_err)
    }

    async fn upsert_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        db::upsert_feedback(&self.pool, entry)
            .await
            .map_err(db_err)?;
        tracing::debug!(
            description = %entry.description,
            category = %entry.target,
            "feedback stored"
        );
        Ok(())
    }

    async fn find_learned_patterns(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<LearnedPattern>, StoreError> {
        db::find_learned_patterns(&self.pool, fragment, limit)
            .await
            .map_err(db_err)
    }

    async fn increment_learned_pattern(
        &self,
        pattern_text: &str,
        target: &CategoryRef,
        at: DateTime<Utc>,
    ) -> Result<LearnedPattern, StoreError> {
        db::increment_learned_pattern(&self.pool, pattern_text, target, at)
            .await
            .map_err(db_err)
    }
}
