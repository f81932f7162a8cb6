use std::sync::Arc;

use kassa_core::{CandidateSet, CategorizationOutcome, FeedbackStore, Method, Money};

use crate::adapter::ExternalClassifierAdapter;
use crate::aliases::MerchantAliasTable;
use crate::batch::BatchSettings;
use crate::classifier::RemoteClassifier;
use crate::config::{ConfigError, EngineConfig};
use crate::history::HistoryLookup;
use crate::matcher::LocalMatcher;
use crate::recorder::FeedbackRecorder;
use crate::suggestion::Suggestion;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorizeOptions {
    /// Skip the local pattern table and go straight to history/remote.
    pub force_api: bool,
}

impl CategorizeOptions {
    pub fn force_api() -> Self {
        Self { force_api: true }
    }
}

/// A step in the categorization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LocalPattern,
    /// Feedback history, learned patterns, then the remote classifier.
    Classifier,
}

/// Stages to try for `description`, in order. The first stage producing a
/// categorized outcome wins.
pub fn precedence(description: &str, options: CategorizeOptions) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(2);
    if !options.force_api && !description.trim().is_empty() {
        stages.push(Stage::LocalPattern);
    }
    stages.push(Stage::Classifier);
    stages
}

/// Public entry point of the categorization engine.
pub struct Categorizer<S, C> {
    matcher: LocalMatcher,
    adapter: ExternalClassifierAdapter<S, C>,
    recorder: FeedbackRecorder<S>,
    batch: BatchSettings,
}

impl<S: FeedbackStore, C: RemoteClassifier> Categorizer<S, C> {
    pub fn new(
        matcher: LocalMatcher,
        adapter: ExternalClassifierAdapter<S, C>,
        recorder: FeedbackRecorder<S>,
        batch: BatchSettings,
    ) -> Self {
        Self {
            matcher,
            adapter,
            recorder,
            batch,
        }
    }

    /// Wires every component from `config` around a shared store.
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<S>,
        classifier: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let matcher = LocalMatcher::new(config.load_pattern_table()?);
        let history = HistoryLookup::new(
            store.clone(),
            MerchantAliasTable::with_extra(config.merchant_aliases.clone()),
            config.history.keyword_limit,
            config.history.max_examples,
        );
        let adapter =
            ExternalClassifierAdapter::new(history, classifier, config.classifier.timeout());
        let recorder = FeedbackRecorder::new(store);

        tracing::info!(patterns = matcher.len(), "categorizer ready");
        let batch = BatchSettings::from(&config.batch);
        Ok(Self::new(matcher, adapter, recorder, batch))
    }

    pub fn matcher(&self) -> &LocalMatcher {
        &self.matcher
    }

    pub fn adapter(&self) -> &ExternalClassifierAdapter<S, C> {
        &self.adapter
    }

    pub fn batch_settings(&self) -> BatchSettings {
        self.batch
    }

    pub fn categorize_locally(&self, description: &str, amount: Money) -> CategorizationOutcome {
        self.matcher.categorize_locally(description, amount)
    }

    pub async fn classify(
        &self,
        description: &str,
        amount: Money,
        candidates: &CandidateSet,
    ) -> Option<Suggestion> {
        self.adapter.classify(description, amount, candidates).await
    }

    /// Always yields an outcome; every failure below degrades to `Uncategorized`.
    #[tracing::instrument(name = "categorize", skip(self, amount, candidates))]
    pub async fn categorize(
        &self,
        description: &str,
        amount: Money,
        candidates: &CandidateSet,
        options: CategorizeOptions,
    ) -> CategorizationOutcome {
        for stage in precedence(description, options) {
            let outcome = match stage {
                Stage::LocalPattern => self.matcher.categorize_locally(description, amount),
                Stage::Classifier => self.remote_outcome(description, amount, candidates).await,
            };

            if outcome.is_categorized() {
                tracing::debug!(
                    ?stage,
                    method = %outcome.method(),
                    confidence = outcome.confidence(),
                    "categorized"
                );
                return outcome;
            }
        }

        tracing::debug!("left uncategorized");
        CategorizationOutcome::uncategorized()
    }

    async fn remote_outcome(
        &self,
        description: &str,
        amount: Money,
        candidates: &CandidateSet,
    ) -> CategorizationOutcome {
        match self.adapter.classify(description, amount, candidates).await {
            Some(s) => CategorizationOutcome::categorized(s.target, s.confidence, Method::Api),
            None => CategorizationOutcome::uncategorized(),
        }
    }

    pub async fn record_feedback(
        &self,
        description: &str,
        amount: Money,
        category_id: &str,
        sub_header_id: &str,
        was_correct: bool,
    ) {
        self.recorder
            .record_feedback(description, amount, category_id, sub_header_id, was_correct)
            .await
    }
}
