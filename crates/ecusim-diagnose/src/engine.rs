use std::sync::Arc;

use ecusim_model::{FailureContext, TestResult};

use crate::catalog::PatternCatalog;
use crate::history::FailureHistory;
use crate::matcher::match_patterns;
use crate::suggest::{rank, SimilarFailureSuggestion};

/// Merges catalog matches and historical neighbors into one ranked
/// suggestion list. Holds shared, dependency-injected services; no
/// global state.
pub struct DiagnosisEngine {
    catalog: Arc<PatternCatalog>,
    history: Arc<FailureHistory>,
}

impl DiagnosisEngine {
    pub fn new(catalog: Arc<PatternCatalog>, history: Arc<FailureHistory>) -> Self {
        Self { catalog, history }
    }

    pub fn history(&self) -> &Arc<FailureHistory> {
        &self.history
    }

    /// Ranked suggestions for one failing result. Degrades to an empty
    /// list when there is nothing to say, never errors.
    pub fn diagnose(
        &self,
        result: &TestResult,
        ctx: &FailureContext,
    ) -> Vec<SimilarFailureSuggestion> {
        let mut suggestions: Vec<SimilarFailureSuggestion> =
            match_patterns(&self.catalog, result, ctx)
                .iter()
                .map(SimilarFailureSuggestion::from_pattern)
                .collect();

        suggestions.extend(
            self.history
                .similar_to(result, ctx)
                .iter()
                .map(SimilarFailureSuggestion::from_history),
        );

        let ranked = rank(suggestions);
        log::debug!(
            "diagnosis for {}: {} suggestion(s)",
            result.id,
            ranked.len()
        );
        ranked
    }
}
