pub mod catalog;
pub mod engine;
pub mod history;
pub mod matcher;
pub mod suggest;

pub use catalog::{FailureCategory, FailurePattern, PatternCatalog};
pub use engine::DiagnosisEngine;
pub use history::FailureHistory;
pub use suggest::SimilarFailureSuggestion;
