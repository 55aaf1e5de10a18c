//! Rendering matches into suggestions, and the final merge/ranking.

use serde::{Deserialize, Serialize};

use ecusim_model::{TestResult, TestStatus};

use crate::catalog::FailureCategory;
use crate::history::HistoricalMatch;
use crate::matcher::PatternMatch;

/// Verbs that make a historical log line worth repeating as a
/// resolution step.
const ACTIONABLE_VERBS: [&str; 8] = [
    "check", "verify", "replace", "reset", "inspect", "reconnect", "clear", "retry",
];

/// Ranked suggestions are truncated to this many entries.
pub const MAX_SUGGESTIONS: usize = 5;

/// One ranked diagnosis suggestion. Ephemeral, recomputed per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarFailureSuggestion {
    /// Pattern id or historical result id this suggestion came from.
    pub source_id: String,
    pub similarity: f64,
    pub confidence: f64,
    pub category: FailureCategory,
    pub suggestion: String,
    pub resolution_steps: Vec<String>,
    pub estimated_fix_time_min: u32,
    pub resolved_by: Option<String>,
}

impl SimilarFailureSuggestion {
    /// A catalog match carries its steps and fix time verbatim.
    pub fn from_pattern(m: &PatternMatch) -> Self {
        Self {
            source_id: m.pattern.id.clone(),
            similarity: m.similarity,
            confidence: m.confidence,
            category: m.pattern.category,
            suggestion: format!(
                "Matches known pattern '{}': {}",
                m.pattern.id, m.pattern.description
            ),
            resolution_steps: m.pattern.resolution_steps.clone(),
            estimated_fix_time_min: m.pattern.average_fix_time_min,
            resolved_by: None,
        }
    }

    /// A historical match synthesizes its steps from the old run's log.
    pub fn from_history(m: &HistoricalMatch) -> Self {
        let mut steps = actionable_log_lines(&m.result);
        if steps.is_empty() {
            steps.push(format!("Review the execution log of {}", m.result.id));
        }
        Self {
            source_id: m.result.id.clone(),
            similarity: m.similarity,
            confidence: m.confidence,
            category: categorize(&m.result),
            suggestion: format!(
                "Resembles earlier failure {}: {}",
                m.result.id,
                m.result.error_message.as_deref().unwrap_or("no message")
            ),
            resolution_steps: steps,
            estimated_fix_time_min: estimate_fix_time(m.result.duration_ms),
            resolved_by: None,
        }
    }

    fn rank_key(&self) -> f64 {
        self.similarity * self.confidence
    }
}

/// Merge both sources, order by descending similarity x confidence and
/// keep the top entries. Ties break arbitrarily.
pub fn rank(mut suggestions: Vec<SimilarFailureSuggestion>) -> Vec<SimilarFailureSuggestion> {
    suggestions.sort_by(|a, b| {
        b.rank_key()
            .partial_cmp(&a.rank_key())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

fn actionable_log_lines(result: &TestResult) -> Vec<String> {
    result
        .logs
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            ACTIONABLE_VERBS.iter().any(|verb| lower.contains(verb))
        })
        .cloned()
        .collect()
}

/// Coarse category for a failure the catalog knows nothing about.
fn categorize(result: &TestResult) -> FailureCategory {
    if result.status == TestStatus::Timeout {
        return FailureCategory::Timing;
    }
    let message = result
        .error_message
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if message.contains("security") || message.contains("access denied") {
        FailureCategory::Security
    } else if message.contains("no response") || message.contains("offline") {
        FailureCategory::Connectivity
    } else {
        FailureCategory::Protocol
    }
}

/// Coarse step function from a historical run's duration to an
/// estimated fix time in minutes.
fn estimate_fix_time(duration_ms: u64) -> u32 {
    match duration_ms {
        0..=999 => 15,
        1_000..=4_999 => 30,
        5_000..=14_999 => 60,
        _ => 120,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::catalog::PatternCatalog;
    use crate::history::HistoricalMatch;
    use crate::matcher::PatternMatch;

    fn pattern_match(id: &str, similarity: f64, confidence: f64) -> PatternMatch {
        let pattern = PatternCatalog::builtin()
            .patterns()
            .iter()
            .find(|p| p.id == id)
            .unwrap()
            .clone();
        PatternMatch {
            pattern,
            similarity,
            confidence,
        }
    }

    fn historical_match(duration_ms: u64, logs: Vec<String>) -> HistoricalMatch {
        HistoricalMatch {
            result: TestResult {
                id: "result-0042".into(),
                sequence_id: "seq-7".into(),
                status: TestStatus::Failure,
                timestamp: Utc::now(),
                duration_ms,
                actual_responses: Vec::new(),
                error_message: Some("No response from abs-1 for service 19".into()),
                logs,
            },
            similarity: 0.7,
            confidence: 0.56,
        }
    }

    #[test]
    fn test_pattern_suggestion_carries_steps_verbatim() {
        let m = pattern_match("ecu-silent", 0.8, 0.85);
        let s = SimilarFailureSuggestion::from_pattern(&m);

        assert_eq!(s.source_id, "ecu-silent");
        assert_eq!(s.resolution_steps, m.pattern.resolution_steps);
        assert_eq!(s.estimated_fix_time_min, 45);
        assert_eq!(s.category, FailureCategory::Connectivity);
    }

    #[test]
    fn test_history_suggestion_filters_actionable_lines() {
        let m = historical_match(
            700,
            vec![
                "Step 0: read_dtc (19) -> abs-1".into(),
                "Check the supply fuse before retrying".into(),
                "No response from abs-1".into(),
            ],
        );
        let s = SimilarFailureSuggestion::from_history(&m);

        assert_eq!(s.resolution_steps.len(), 2);
        assert!(s.resolution_steps[0].contains("Check"));
        assert_eq!(s.estimated_fix_time_min, 15);
        assert_eq!(s.category, FailureCategory::Connectivity);
    }

    #[test]
    fn test_history_suggestion_falls_back_to_generic_step() {
        let m = historical_match(6_000, vec!["Step 0: session_control (10) -> abs-1".into()]);
        let s = SimilarFailureSuggestion::from_history(&m);

        assert_eq!(s.resolution_steps.len(), 1);
        assert!(s.resolution_steps[0].contains("result-0042"));
        assert_eq!(s.estimated_fix_time_min, 60);
    }

    #[test]
    fn test_fix_time_step_function() {
        assert_eq!(estimate_fix_time(0), 15);
        assert_eq!(estimate_fix_time(999), 15);
        assert_eq!(estimate_fix_time(1_000), 30);
        assert_eq!(estimate_fix_time(5_000), 60);
        assert_eq!(estimate_fix_time(60_000), 120);
    }

    #[test]
    fn test_rank_orders_by_similarity_times_confidence() {
        let low = SimilarFailureSuggestion::from_pattern(&pattern_match("bus-timeout", 0.5, 0.5));
        let high = SimilarFailureSuggestion::from_pattern(&pattern_match("ecu-silent", 0.9, 0.9));
        let mid = SimilarFailureSuggestion::from_pattern(&pattern_match("security-lockout", 0.8, 0.6));

        let ranked = rank(vec![low, high, mid]);
        assert_eq!(ranked[0].source_id, "ecu-silent");
        assert_eq!(ranked[1].source_id, "security-lockout");
        assert_eq!(ranked[2].source_id, "bus-timeout");
    }

    #[test]
    fn test_rank_truncates_to_five() {
        let suggestions: Vec<_> = (0..8)
            .map(|i| {
                let mut s =
                    SimilarFailureSuggestion::from_pattern(&pattern_match("ecu-silent", 0.5, 0.5));
                s.source_id = format!("p{i}");
                s.similarity = 0.5 + 0.05 * i as f64;
                s
            })
            .collect();

        let ranked = rank(suggestions);
        assert_eq!(ranked.len(), MAX_SUGGESTIONS);
        assert_eq!(ranked[0].source_id, "p7");
    }
}
