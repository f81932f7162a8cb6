use chrono::{DateTime, NaiveDate, Utc};
use kassa_core::{CategorizationOutcome, CategoryRef, FeedbackEntry, LearnedPattern, Method, Money};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    apply_pragmas(&pool).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// A private in-memory database. The single connection is never recycled,
/// otherwise the data would vanish with it.
pub async fn create_memory_db() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    apply_pragmas(&pool).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

async fn apply_pragmas(pool: &DbPool) -> Result<(), sqlx::Error> {
    for pragma in [
        "PRAGMA foreign_keys = ON",
        "PRAGMA synchronous = NORMAL",
        "PRAGMA busy_timeout = 5000",
        "PRAGMA cache_size = -32000",
    ] {
        sqlx::query(pragma).execute(pool).await?;
    }
    Ok(())
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category_id TEXT,
            sub_header_id TEXT,
            categorization_method TEXT,
            confidence REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // `description_folded` is lower-cased in Rust so substring lookups fold
    // non-ASCII letters (Å, Ä, Ö) that SQLite's lower() leaves alone.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categorization_feedback (
            description TEXT PRIMARY KEY,
            description_folded TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category_id TEXT NOT NULL,
            sub_header_id TEXT NOT NULL,
            was_correct INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learned_patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern_text TEXT NOT NULL,
            category_id TEXT NOT NULL,
            sub_header_id TEXT NOT NULL,
            frequency_count INTEGER NOT NULL DEFAULT 1 CHECK (frequency_count >= 1),
            last_updated TEXT NOT NULL,
            UNIQUE (pattern_text, category_id, sub_header_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_uncategorized ON transactions (category_id) WHERE category_id IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Transactions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub category_id: Option<String>,
    pub sub_header_id: Option<String>,
    pub categorization_method: Option<Method>,
    pub confidence: Option<f32>,
}

type TransactionRow = (
    i64,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<f64>,
);

const TRANSACTION_COLUMNS: &str =
    "id, date, description, amount_cents, category_id, sub_header_id, categorization_method, confidence";

fn transaction_from_row(r: TransactionRow) -> Result<StoredTransaction, sqlx::Error> {
    let date = NaiveDate::parse_from_str(&r.1, "%Y-%m-%d")
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let categorization_method = r
        .6
        .as_deref()
        .map(Method::from_str)
        .transpose()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    Ok(StoredTransaction {
        id: r.0,
        date,
        description: r.2,
        amount: Money::from_cents(r.3),
        category_id: r.4,
        sub_header_id: r.5,
        categorization_method,
        confidence: r.7.map(|c| c as f32),
    })
}

pub async fn insert_transaction(
    pool: &DbPool,
    date: NaiveDate,
    description: &str,
    amount: Money,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO transactions (date, description, amount_cents) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(date.format("%Y-%m-%d").to_string())
    .bind(description)
    .bind(amount.to_cents())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn get_transaction(
    pool: &DbPool,
    id: i64,
) -> Result<Option<StoredTransaction>, sqlx::Error> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(transaction_from_row).transpose()
}

pub async fn get_uncategorized_transactions(
    pool: &DbPool,
    limit: usize,
) -> Result<Vec<StoredTransaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE category_id IS NULL ORDER BY date, id LIMIT ?"
    ))
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(transaction_from_row).collect()
}

/// Writes the outcome onto the transaction. Returns false if no row has `id`.
/// An `Uncategorized` outcome clears any previous assignment.
pub async fn assign_transaction_category(
    pool: &DbPool,
    id: i64,
    outcome: &CategorizationOutcome,
) -> Result<bool, sqlx::Error> {
    let categorized = outcome.is_categorized();
    let method = categorized.then(|| outcome.method().to_string());
    let confidence = categorized.then(|| f64::from(outcome.confidence()));

    let result = sqlx::query(
        "UPDATE transactions SET category_id = ?, sub_header_id = ?, categorization_method = ?, confidence = ? WHERE id = ?",
    )
    .bind(outcome.category_id())
    .bind(outcome.sub_header_id())
    .bind(method)
    .bind(confidence)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Records a category chosen or confirmed by a person. No engine method
/// applies, so the method column is cleared and confidence set to 1.
pub async fn assign_confirmed_category(
    pool: &DbPool,
    id: i64,
    target: &CategoryRef,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET category_id = ?, sub_header_id = ?, categorization_method = NULL, confidence = 1.0 WHERE id = ?",
    )
    .bind(&target.category_id)
    .bind(&target.sub_header_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ── Feedback ──────────────────────────────────────────────────────────────────

type FeedbackRow = (String, i64, String, String, i64, DateTime<Utc>);

const FEEDBACK_COLUMNS: &str =
    "description, amount_cents, category_id, sub_header_id, was_correct, created_at";

fn feedback_from_row(r: FeedbackRow) -> FeedbackEntry {
    FeedbackEntry {
        description: r.0,
        amount: Money::from_cents(r.1),
        target: CategoryRef::new(r.2, r.3),
        was_correct: r.4 != 0,
        recorded_at: r.5,
    }
}

pub async fn upsert_feedback(pool: &DbPool, entry: &FeedbackEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO categorization_feedback
            (description, description_folded, amount_cents, category_id, sub_header_id,
             was_correct, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(description) DO UPDATE SET
            amount_cents = excluded.amount_cents,
            category_id = excluded.category_id,
            sub_header_id = excluded.sub_header_id,
            was_correct = excluded.was_correct,
            created_at = excluded.created_at
        "#,
    )
    .bind(&entry.description)
    .bind(entry.description.to_lowercase())
    .bind(entry.amount.to_cents())
    .bind(&entry.target.category_id)
    .bind(&entry.target.sub_header_id)
    .bind(i64::from(entry.was_correct))
    .bind(entry.recorded_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_confirmed_feedback(
    pool: &DbPool,
    description: &str,
) -> Result<Option<FeedbackEntry>, sqlx::Error> {
    let row = sqlx::query_as::<_, FeedbackRow>(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM categorization_feedback WHERE description = ? AND was_correct = 1 ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(description)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(feedback_from_row))
}

pub async fn find_confirmed_feedback_containing(
    pool: &DbPool,
    keyword: &str,
    limit: usize,
) -> Result<Vec<FeedbackEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM categorization_feedback WHERE was_correct = 1 AND instr(description_folded, ?) > 0 ORDER BY created_at DESC LIMIT ?"
    ))
    .bind(keyword.to_lowercase())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(feedback_from_row).collect())
}

pub async fn count_feedback(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM categorization_feedback")
        .fetch_one(pool)
        .await
}

// ── Learned patterns ──────────────────────────────────────────────────────────

type LearnedPatternRow = (String, String, String, i64, DateTime<Utc>);

const LEARNED_PATTERN_COLUMNS: &str =
    "pattern_text, category_id, sub_header_id, frequency_count, last_updated";

fn learned_pattern_from_row(r: LearnedPatternRow) -> LearnedPattern {
    LearnedPattern {
        pattern_text: r.0,
        target: CategoryRef::new(r.1, r.2),
        frequency_count: u32::try_from(r.3.max(1)).unwrap_or(u32::MAX),
        last_updated: r.4,
    }
}

pub async fn increment_learned_pattern(
    pool: &DbPool,
    pattern_text: &str,
    target: &CategoryRef,
    at: DateTime<Utc>,
) -> Result<LearnedPattern, sqlx::Error> {
    let row = sqlx::query_as::<_, LearnedPatternRow>(&format!(
        r#"
        INSERT INTO learned_patterns
            (pattern_text, category_id, sub_header_id, frequency_count, last_updated)
        VALUES (?, ?, ?, 1, ?)
        ON CONFLICT(pattern_text, category_id, sub_header_id) DO UPDATE SET
            frequency_count = frequency_count + 1,
            last_updated = excluded.last_updated
        RETURNING {LEARNED_PATTERN_COLUMNS}
        "#
    ))
    .bind(pattern_text)
    .bind(&target.category_id)
    .bind(&target.sub_header_id)
    .bind(at)
    .fetch_one(pool)
    .await?;

    Ok(learned_pattern_from_row(row))
}

/// `fragment` is matched case-sensitively against the stored upper-case text,
/// so callers pass it upper-cased.
pub async fn find_learned_patterns(
    pool: &DbPool,
    fragment: &str,
    limit: usize,
) -> Result<Vec<LearnedPattern>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LearnedPatternRow>(&format!(
        "SELECT {LEARNED_PATTERN_COLUMNS} FROM learned_patterns WHERE instr(pattern_text, ?) > 0 ORDER BY frequency_count DESC, last_updated DESC LIMIT ?"
    ))
    .bind(fragment.to_uppercase())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(learned_pattern_from_row).collect())
}
