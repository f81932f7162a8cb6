pub mod db;
pub mod store;

pub use db::{
    assign_confirmed_category, assign_transaction_category, count_feedback, create_db,
    create_memory_db, find_confirmed_feedback, find_confirmed_feedback_containing,
    find_learned_patterns, get_transaction, get_uncategorized_transactions,
    increment_learned_pattern, insert_transaction, upsert_feedback, DbPool, StoredTransaction,
};
pub use store::SqliteStore;
