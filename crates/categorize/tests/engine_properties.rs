use std::sync::Arc;

use kassa_categorize::{
    CategorizeOptions, Categorizer, EngineConfig, LocalMatcher, MatchType, MemoryFeedbackStore,
    MockClassifier, PatternEntry, PatternTable, SuggestionSource,
};
use kassa_core::{
    CandidateSet, CategorizationOutcome, CategoryOption, CategoryRef, FeedbackStore, Method, Money,
    SubHeaderOption,
};
use kassa_storage::{create_db, SqliteStore};

fn candidates() -> CandidateSet {
    CandidateSet::new(vec![
        CategoryOption {
            id: "food".into(),
            name: "Mat".into(),
            sub_headers: vec![
                SubHeaderOption::new("groceries", "Livsmedel"),
                SubHeaderOption::new("restaurants", "Restaurang"),
            ],
        },
        CategoryOption {
            id: "home".into(),
            name: "Boende".into(),
            sub_headers: vec![SubHeaderOption::new("rent", "Hyra")],
        },
    ])
}

type MemoryEngine = Categorizer<MemoryFeedbackStore, MockClassifier>;

fn memory_engine(mock: MockClassifier) -> (Arc<MemoryFeedbackStore>, MemoryEngine) {
    let store = Arc::new(MemoryFeedbackStore::new());
    let config = EngineConfig::default();
    let engine = Categorizer::from_config(&config, store.clone(), mock).unwrap();
    (store, engine)
}

async fn categorize<S: FeedbackStore>(
    engine: &Categorizer<S, MockClassifier>,
    description: &str,
    candidates: &CandidateSet,
) -> CategorizationOutcome {
    let options = CategorizeOptions::default();
    engine
        .categorize(description, Money::zero(), candidates, options)
        .await
}

async fn confirm<S: FeedbackStore>(
    engine: &Categorizer<S, MockClassifier>,
    description: &str,
    target: (&str, &str),
) {
    let amount = Money::from_cents(-18900);
    engine
        .record_feedback(description, amount, target.0, target.1, true)
        .await;
}

#[test]
fn matcher_is_deterministic() {
    let matcher = LocalMatcher::default();
    for description in ["ICA KVANTUM", "willys hemma", "RANDOM SHOP", "LÖN", "  "] {
        let first = matcher.find_match(description).cloned();
        let second = matcher.find_match(description).cloned();
        assert_eq!(first, second, "{description}");
    }
}

#[test]
fn earlier_entry_wins_regardless_of_specificity() {
    let table = PatternTable::new(vec![
        PatternEntry::new("KVANTUM", MatchType::Contains, "food", "general", "broad"),
        PatternEntry::new(
            "ICA KVANTUM FARSTA",
            MatchType::Exact,
            "food",
            "groceries",
            "narrow",
        ),
    ])
    .unwrap();
    let matcher = LocalMatcher::new(table);
    let hit = matcher.find_match("ICA KVANTUM FARSTA").unwrap();
    assert_eq!(hit.label, "broad");
}

#[test]
fn case_and_padding_are_ignored() {
    let matcher = LocalMatcher::default();
    let padded = matcher.find_match(" ica kvantum ");
    assert_eq!(padded, matcher.find_match("ICA KVANTUM"));
}

#[tokio::test]
async fn local_pattern_takes_precedence() {
    let (_, engine) = memory_engine(MockClassifier::suggesting("home", "rent"));
    for set in [candidates(), CandidateSet::empty()] {
        let outcome = categorize(&engine, "ICA KVANTUM FARSTA", &set).await;
        assert_eq!(outcome.method(), Method::LocalPattern);
        assert_eq!(outcome.confidence(), 0.9);
        let groceries = CategoryRef::new("food", "groceries");
        assert_eq!(outcome.target(), Some(groceries));
    }
}

#[tokio::test]
async fn force_api_skips_local_pattern() {
    let (_, engine) = memory_engine(MockClassifier::failing("offline"));
    let amount = Money::from_cents(1000);
    let options = CategorizeOptions::force_api();
    let outcome = engine
        .categorize("ICA KVANTUM", amount, &candidates(), options)
        .await;
    assert_ne!(outcome.method(), Method::LocalPattern);
    assert_eq!(engine.adapter().classifier().calls(), 1);
}

#[tokio::test]
async fn remote_id_outside_candidates_is_uncategorized() {
    let (_, engine) = memory_engine(MockClassifier::suggesting("travel", "flights"));
    let suggestion = engine
        .classify("NORWEGIAN AIR", Money::from_cents(-129900), &candidates())
        .await;
    assert!(suggestion.is_none());

    let outcome = categorize(&engine, "NORWEGIAN AIR", &candidates()).await;
    assert_eq!(outcome, CategorizationOutcome::uncategorized());
}

#[tokio::test]
async fn exact_history_beats_remote() {
    let (_, engine) = memory_engine(MockClassifier::suggesting("food", "groceries"));
    confirm(&engine, "HYRA HSB APRIL", ("home", "rent")).await;

    let suggestion = engine
        .classify("HYRA HSB APRIL", Money::from_cents(-850000), &candidates())
        .await
        .unwrap();
    assert_eq!(suggestion.source, SuggestionSource::ExactHistory);
    assert_eq!(suggestion.confidence, 1.0);
    assert_eq!(suggestion.target, CategoryRef::new("home", "rent"));
    assert_eq!(engine.adapter().classifier().calls(), 0);
}

#[tokio::test]
async fn repeated_feedback_keeps_one_entry_and_counts_twice() {
    let (store, engine) = memory_engine(MockClassifier::failing("unused"));
    for _ in 0..2 {
        confirm(&engine, "VAPIANO STUREPLAN", ("food", "restaurants")).await;
    }
    assert_eq!(store.feedback_entries().len(), 1);
    let patterns = store.learned_patterns();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].frequency_count, 2);
}

#[tokio::test]
async fn empty_everything_is_uncategorized() {
    let (_, engine) = memory_engine(MockClassifier::suggesting("food", "groceries"));
    let outcome = categorize(&engine, "", &CandidateSet::empty()).await;
    assert_eq!(outcome.category_id(), None);
    assert_eq!(outcome.sub_header_id(), None);
    assert_eq!(outcome.confidence(), 0.0);
    assert_eq!(outcome.method(), Method::Uncategorized);
}

#[tokio::test]
async fn learned_confidence_rises_to_cap() {
    let (_, engine) = memory_engine(MockClassifier::failing("offline"));
    let mut seen = Vec::new();
    for n in 1..=6 {
        // Distinct descriptions so the exact-history path never short-circuits.
        let description = format!("VAPIANO {n}");
        confirm(&engine, &description, ("food", "restaurants")).await;
        let s = engine
            .classify("VAPIANO KUNGSGATAN", Money::zero(), &candidates())
            .await
            .unwrap();
        assert_eq!(s.source, SuggestionSource::LearnedPattern);
        seen.push(s.confidence);
    }

    assert!((seen[0] - 0.80).abs() < 1e-5);
    for pair in seen[..4].windows(2) {
        assert!(pair[1] > pair[0], "{seen:?}");
    }
    assert!((seen[3] - 0.95).abs() < 1e-5);
    let capped = seen[4..].iter().all(|c| (c - 0.95).abs() < 1e-5);
    assert!(capped, "{seen:?}");
}

#[tokio::test]
async fn sqlite_store_round_trip_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_db(&dir.path().join("kassa.db")).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let engine = Categorizer::from_config(
        &EngineConfig::default(),
        store.clone(),
        MockClassifier::failing("offline"),
    )
    .unwrap();

    for _ in 0..2 {
        confirm(&engine, "VAPIANO STUREPLAN", ("food", "restaurants")).await;
    }

    let learned = store.find_learned_patterns("VAPIANO", 5).await.unwrap();
    assert_eq!(learned.len(), 1);
    assert_eq!(learned[0].frequency_count, 2);

    let exact = categorize(&engine, "VAPIANO STUREPLAN", &candidates()).await;
    assert_eq!(exact.method(), Method::Api);
    assert_eq!(exact.confidence(), 1.0);

    let learned_outcome = categorize(&engine, "VAPIANO HORNSGATAN", &candidates()).await;
    assert_eq!(learned_outcome.method(), Method::Api);
    assert!((learned_outcome.confidence() - 0.85).abs() < 1e-5);
}
