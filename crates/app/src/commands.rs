use anyhow::{Context, Result};
use chrono::NaiveDate;
use kassa_categorize::{BatchItem, CategorizeOptions, Categorizer, RemoteClassifier};
use kassa_core::{CandidateSet, CategorizationOutcome, CategoryRef, Money};
use kassa_storage::{DbPool, SqliteStore};
use serde::Serialize;

pub type Engine<C> = Categorizer<SqliteStore, C>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingSummary {
    pub processed: usize,
    pub categorized: usize,
    pub uncategorized: usize,
}

pub async fn add_transaction(
    db: &DbPool,
    date: NaiveDate,
    description: &str,
    amount: Money,
) -> Result<i64> {
    let id = kassa_storage::insert_transaction(db, date, description, amount)
        .await
        .context("insert transaction")?;
    tracing::info!(id, %amount, "transaction added");
    Ok(id)
}

pub async fn categorize_one<C: RemoteClassifier>(
    engine: &Engine<C>,
    description: &str,
    amount: Money,
    candidates: &CandidateSet,
    options: CategorizeOptions,
) -> CategorizationOutcome {
    engine
        .categorize(description, amount, candidates, options)
        .await
}

/// Runs the engine over stored transactions that have no category yet and
/// writes every categorized outcome back.
pub async fn categorize_pending<C: RemoteClassifier>(
    db: &DbPool,
    engine: &Engine<C>,
    candidates: &CandidateSet,
    limit: usize,
    options: CategorizeOptions,
) -> Result<PendingSummary> {
    let pending = kassa_storage::get_uncategorized_transactions(db, limit)
        .await
        .context("load uncategorized transactions")?;
    if pending.is_empty() {
        tracing::info!("nothing to categorize");
        return Ok(PendingSummary::default());
    }

    let items: Vec<BatchItem> = pending
        .into_iter()
        .map(|t| BatchItem {
            id: t.id,
            description: t.description,
            amount: t.amount,
        })
        .collect();

    let results = engine.categorize_batch(&items, candidates, options).await;

    let mut summary = PendingSummary {
        processed: results.len(),
        ..Default::default()
    };
    for result in &results {
        if !result.outcome.is_categorized() {
            summary.uncategorized += 1;
            continue;
        }
        kassa_storage::assign_transaction_category(db, result.id, &result.outcome)
            .await
            .with_context(|| format!("store category for transaction {}", result.id))?;
        summary.categorized += 1;
    }

    Ok(summary)
}

/// Records a user's verdict. A confirmed category is also written onto the
/// transaction when one is named.
pub async fn record_feedback<C: RemoteClassifier>(
    db: &DbPool,
    engine: &Engine<C>,
    description: &str,
    amount: Money,
    target: &CategoryRef,
    was_correct: bool,
    transaction_id: Option<i64>,
) -> Result<()> {
    engine
        .record_feedback(
            description,
            amount,
            &target.category_id,
            &target.sub_header_id,
            was_correct,
        )
        .await;

    if let (Some(id), true) = (transaction_id, was_correct) {
        let found = kassa_storage::assign_confirmed_category(db, id, target)
            .await
            .with_context(|| format!("store category for transaction {id}"))?;
        if !found {
            anyhow::bail!("no transaction with id {id}");
        }
    }
    Ok(())
}
