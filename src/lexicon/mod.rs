//! Learned lexicon
//!
//! Recurring reviewer corrections are counted per scope and promoted to a
//! lexicon entry once the scope's threshold is met. The lexicon is applied
//! to fresh OCR output before history-based resolution.

mod applicator;
mod learner;
mod store;
mod types;

pub use applicator::{preserve_case, LexiconApplicator, Suggestion, TextCorrection};
pub use learner::LexiconLearner;
pub use store::LexiconRepository;
pub use types::{normalize_key, LexiconEntry, LexiconSnapshot, PromotionOutcome, Scope};
