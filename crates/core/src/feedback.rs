use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::CategoryRef;
use crate::money::Money;

/// Base confidence of a learned pattern seen once is `BASE + STEP`.
pub const LEARNED_CONFIDENCE_BASE: f32 = 0.75;
pub const LEARNED_CONFIDENCE_STEP: f32 = 0.05;
pub const LEARNED_CONFIDENCE_CAP: f32 = 0.95;

/// A human confirmation or correction of a categorization.
/// At most one entry exists per exact `description`; later writes replace earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub description: String,
    pub amount: Money,
    pub target: CategoryRef,
    pub was_correct: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Merchant prefix to category association, built from confirmed feedback.
/// Unique per `(pattern_text, target)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub pattern_text: String,
    pub target: CategoryRef,
    pub frequency_count: u32,
    pub last_updated: DateTime<Utc>,
}

impl LearnedPattern {
    pub fn confidence(&self) -> f32 {
        learned_confidence(self.frequency_count)
    }
}

/// `min(0.95, 0.75 + frequency * 0.05)`.
pub fn learned_confidence(frequency_count: u32) -> f32 {
    let raw = LEARNED_CONFIDENCE_BASE + frequency_count as f32 * LEARNED_CONFIDENCE_STEP;
    raw.min(LEARNED_CONFIDENCE_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn single_occurrence_is_point_eight() {
        assert!(close(learned_confidence(1), 0.80));
    }

    #[test]
    fn confidence_grows_until_cap() {
        let values: Vec<f32> = (1..=4).map(learned_confidence).collect();
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0], "{values:?} is not increasing");
        }
        assert!(close(values[3], 0.95));
    }

    #[test]
    fn confidence_never_exceeds_cap() {
        for n in [5, 10, 1_000, u32::MAX] {
            assert!(learned_confidence(n) <= LEARNED_CONFIDENCE_CAP);
        }
    }
}
