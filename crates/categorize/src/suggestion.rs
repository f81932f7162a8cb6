use kassa_core::CategoryRef;
use serde::{Deserialize, Serialize};

/// Fixed confidence for a validated remote suggestion; the remote service
/// reports no certainty of its own.
pub const REMOTE_CONFIDENCE: f32 = 0.8;
/// Confidence for a description a human has already confirmed verbatim.
pub const EXACT_HISTORY_CONFIDENCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    ExactHistory,
    LearnedPattern,
    Remote,
}

/// A candidate-validated category proposal from the classifier adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub target: CategoryRef,
    pub confidence: f32,
    pub source: SuggestionSource,
}

impl Suggestion {
    pub fn new(target: CategoryRef, confidence: f32, source: SuggestionSource) -> Self {
        Self {
            target,
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }
}
