//! Transaction categorization engine.
//!
//! A description is tried against the local pattern table first; on a miss
//! the classifier adapter consults confirmed feedback, the learned-pattern
//! index and finally a remote classifier. Human feedback flows back through
//! [`FeedbackRecorder`] into the same store.

pub mod adapter;
pub mod aliases;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod history;
pub mod matcher;
pub mod memory;
pub mod patterns;
pub mod recorder;
pub mod suggestion;

pub use adapter::ExternalClassifierAdapter;
pub use aliases::{MerchantAlias, MerchantAliasTable};
pub use batch::{BatchItem, BatchResult, BatchSettings};
pub use classifier::{
    ClassificationRequest, ClassifierError, HttpClassifier, MockBehavior, MockClassifier,
    RemoteClassifier, RemoteSuggestion,
};
pub use config::{BatchConfig, ClassifierConfig, ConfigError, EngineConfig, HistoryConfig};
pub use engine::{precedence, CategorizeOptions, Categorizer, Stage};
pub use history::{HistoricalExample, HistoryFindings, HistoryLookup};
pub use matcher::{LocalMatcher, LOCAL_PATTERN_CONFIDENCE};
pub use memory::MemoryFeedbackStore;
pub use patterns::{MatchType, PatternEntry, PatternTable, PatternTableError};
pub use recorder::FeedbackRecorder;
pub use suggestion::{Suggestion, SuggestionSource, EXACT_HISTORY_CONFIDENCE, REMOTE_CONFIDENCE};
