use std::time::Duration;

use kassa_core::{CandidateSet, CategoryRef, FeedbackStore, Money};

use crate::classifier::{ClassificationRequest, ClassifierError, RemoteClassifier};
use crate::history::HistoryLookup;
use crate::suggestion::{Suggestion, SuggestionSource, REMOTE_CONFIDENCE};

/// Slow path: feedback history first, then the remote classifier.
///
/// Every answer names a pair from the caller's candidate set. Transport,
/// parse, timeout and validation failures are logged and become `None`.
pub struct ExternalClassifierAdapter<S, C> {
    history: HistoryLookup<S>,
    classifier: C,
    timeout: Duration,
}

impl<S: FeedbackStore, C: RemoteClassifier> ExternalClassifierAdapter<S, C> {
    pub fn new(history: HistoryLookup<S>, classifier: C, timeout: Duration) -> Self {
        Self {
            history,
            classifier,
            timeout,
        }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn history(&self) -> &HistoryLookup<S> {
        &self.history
    }

    #[tracing::instrument(
        name = "classify",
        skip(self, amount, candidates),
        fields(candidates = candidates.refs().count())
    )]
    pub async fn classify(
        &self,
        description: &str,
        amount: Money,
        candidates: &CandidateSet,
    ) -> Option<Suggestion> {
        if description.trim().is_empty() || candidates.is_empty() {
            tracing::debug!("nothing to classify");
            return None;
        }

        let findings = self
            .history
            .find_historical_match(description, candidates)
            .await;
        if let Some(definitive) = findings.definitive {
            tracing::debug!(
                source = ?definitive.source,
                confidence = definitive.confidence,
                "history answered; skipping remote classifier"
            );
            return Some(definitive);
        }

        let request =
            ClassificationRequest::new(description, amount, candidates, &findings.examples);
        match self.ask_remote(&request, candidates).await {
            Ok(suggestion) => {
                tracing::debug!(
                    category_id = %suggestion.target.category_id,
                    sub_header_id = %suggestion.target.sub_header_id,
                    examples = request.contextual_examples.len(),
                    "remote classifier suggestion accepted"
                );
                Some(suggestion)
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote classification failed");
                None
            }
        }
    }

    async fn ask_remote(
        &self,
        request: &ClassificationRequest,
        candidates: &CandidateSet,
    ) -> Result<Suggestion, ClassifierError> {
        let remote = tokio::time::timeout(self.timeout, self.classifier.suggest(request))
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        if !candidates.contains_ids(&remote.category_id, &remote.sub_header_id) {
            return Err(ClassifierError::NotACandidate {
                category_id: remote.category_id,
                sub_header_id: remote.sub_header_id,
            });
        }

        Ok(Suggestion::new(
            CategoryRef::new(remote.category_id, remote.sub_header_id),
            REMOTE_CONFIDENCE,
            SuggestionSource::Remote,
        ))
    }
}
