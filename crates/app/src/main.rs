use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kassa_categorize::{CategorizeOptions, Categorizer, HttpClassifier};
use kassa_core::{CandidateSet, CategoryRef, Money};
use kassa_storage::{DbPool, SqliteStore};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kassa", version, about = "Categorize bank transactions into budget categories")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "KASSA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a transaction in the ledger.
    Add {
        date: NaiveDate,
        description: String,
        #[arg(allow_hyphen_values = true)]
        amount: Money,
    },
    /// Categorize a single description and print the outcome as JSON.
    Categorize {
        description: String,
        #[arg(allow_hyphen_values = true)]
        amount: Money,
        /// Skip local patterns and ask the classifier directly.
        #[arg(long)]
        force_api: bool,
    },
    /// Categorize stored transactions that have no category yet.
    CategorizePending {
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long)]
        force_api: bool,
    },
    /// Record whether a category was right for a description.
    Feedback {
        description: String,
        #[arg(allow_hyphen_values = true)]
        amount: Money,
        category: String,
        sub_header: String,
        /// The category was wrong.
        #[arg(long)]
        incorrect: bool,
        /// Also write the confirmed category onto this stored transaction.
        #[arg(long)]
        transaction: Option<i64>,
    },
}

fn options(force_api: bool) -> CategorizeOptions {
    if force_api {
        CategorizeOptions::force_api()
    } else {
        CategorizeOptions::default()
    }
}

/// Builds the categorizer over the ledger database. Only the commands that
/// categorize or learn need it.
fn build_engine(cfg: &config::AppConfig, db: &DbPool) -> Result<commands::Engine<HttpClassifier>> {
    let classifier =
        HttpClassifier::from_config(&cfg.engine.classifier).context("build classifier client")?;
    let store = Arc::new(SqliteStore::new(db.clone()));
    Categorizer::from_config(&cfg.engine, store, classifier).context("configure categorizer")
}

fn candidates(cfg: &config::AppConfig) -> CandidateSet {
    let candidates = cfg.candidates();
    if candidates.is_empty() {
        tracing::warn!(
            "no [[categories]] configured; remote classification will be skipped"
        );
    }
    candidates
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    let db_path = config::database_path(&cfg)?;
    let db = kassa_storage::create_db(&db_path)
        .await
        .with_context(|| format!("open database {}", db_path.display()))?;

    match cli.command {
        Command::Add {
            date,
            description,
            amount,
        } => {
            let id = commands::add_transaction(&db, date, &description, amount).await?;
            println!("{id}");
        }
        Command::Categorize {
            description,
            amount,
            force_api,
        } => {
            let engine = build_engine(&cfg, &db)?;
            let candidates = candidates(&cfg);
            let outcome = commands::categorize_one(
                &engine,
                &description,
                amount,
                &candidates,
                options(force_api),
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::CategorizePending { limit, force_api } => {
            let engine = build_engine(&cfg, &db)?;
            let candidates = candidates(&cfg);
            let summary = commands::categorize_pending(
                &db,
                &engine,
                &candidates,
                limit,
                options(force_api),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Feedback {
            description,
            amount,
            category,
            sub_header,
            incorrect,
            transaction,
        } => {
            let engine = build_engine(&cfg, &db)?;
            let target = CategoryRef::new(category, sub_header);
            commands::record_feedback(
                &db,
                &engine,
                &description,
                amount,
                &target,
                !incorrect,
                transaction,
            )
            .await?;
            tracing::info!(category = %target, correct = !incorrect, "feedback recorded");
        }
    }

    Ok(())
}
