//! Text normalization applied to transcript tiers and tagger output

pub mod age;
pub mod annotation;
pub mod cleaner;
pub mod corrections;
pub mod tokenizer;

pub use age::{correct_age_literal, parse_age, AGE_CORRECTIONS};
pub use annotation::annotate;
pub use cleaner::clean_utterance;
pub use corrections::{correct_tagged, CorrectionReport, LemmaCorrection, FRENCH_CORRECTIONS};
pub use tokenizer::{tokenize, tokens, Language};
