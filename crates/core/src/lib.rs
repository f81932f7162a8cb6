pub mod category;
pub mod feedback;
pub mod money;
pub mod normalize;
pub mod store;

pub use category::{
    CandidateSet, CategorizationOutcome, CategoryOption, CategoryRef, Method, SubHeaderOption,
};
pub use feedback::{learned_confidence, FeedbackEntry, LearnedPattern};
pub use money::Money;
pub use store::{FeedbackStore, StoreError};
