//! Rolling window of past failures with token-overlap similarity.

use std::collections::{HashSet, VecDeque};
use std::sync::RwLock;

use ecusim_model::{FailureContext, TestResult};

/// Retention cap of the ring buffer.
pub const MAX_ENTRIES: usize = 100;

/// Entries at or below this score are discarded.
const SIMILARITY_FLOOR: f64 = 0.6;

const MESSAGE_WEIGHT: f64 = 0.4;
const SERVICE_WEIGHT: f64 = 0.3;
const ECU_TYPE_WEIGHT: f64 = 0.3;

/// Historical matches are always trusted less than catalog matches.
const HISTORY_TRUST: f64 = 0.8;

/// One retained failure scored against the current one.
#[derive(Debug, Clone)]
pub struct HistoricalMatch {
    pub result: TestResult,
    pub similarity: f64,
    pub confidence: f64,
}

/// Capacity-bounded ring buffer of past failing results, newest first.
///
/// The lock makes appends and evictions atomic with respect to
/// concurrent readers — a reader never observes a partially evicted
/// buffer.
pub struct FailureHistory {
    entries: RwLock<VecDeque<TestResult>>,
}

impl FailureHistory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Prepend a failing result, evicting the oldest beyond capacity.
    pub fn record(&self, result: TestResult) {
        let mut entries = self.entries.write().unwrap();
        entries.push_front(result);
        entries.truncate(MAX_ENTRIES);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().unwrap().iter().any(|e| e.id == id)
    }

    /// Snapshot of the retained entries, newest first.
    pub fn snapshot(&self) -> Vec<TestResult> {
        self.entries.read().unwrap().iter().cloned().collect()
    }

    /// Score every retained failure against the current one. Entries
    /// scoring at or below the floor are dropped.
    pub fn similar_to(&self, result: &TestResult, ctx: &FailureContext) -> Vec<HistoricalMatch> {
        let current_message = result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let service_code = ctx.service.to_string();
        let ecu_type_label = ctx.ecu_type.as_str();

        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .filter(|entry| entry.id != result.id)
            .filter_map(|entry| {
                let historical_message = entry
                    .error_message
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase();

                let mut score = MESSAGE_WEIGHT * token_overlap(&current_message, &historical_message);
                if entry.logs.iter().any(|line| line.contains(&service_code)) {
                    score += SERVICE_WEIGHT;
                }
                if entry
                    .logs
                    .iter()
                    .any(|line| line.to_lowercase().contains(ecu_type_label))
                {
                    score += ECU_TYPE_WEIGHT;
                }
                let similarity = score.min(1.0);

                if similarity <= SIMILARITY_FLOOR {
                    return None;
                }
                Some(HistoricalMatch {
                    result: entry.clone(),
                    similarity,
                    confidence: similarity * HISTORY_TRUST,
                })
            })
            .collect()
    }
}

impl Default for FailureHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared lowercase words divided by the longer message's word count.
fn token_overlap(current: &str, historical: &str) -> f64 {
    let current_words: Vec<&str> = current.split_whitespace().collect();
    let historical_words: Vec<&str> = historical.split_whitespace().collect();
    let longer = current_words.len().max(historical_words.len());
    if longer == 0 {
        return 0.0;
    }

    let historical_set: HashSet<&str> = historical_words.iter().copied().collect();
    let shared = current_words
        .iter()
        .filter(|w| historical_set.contains(**w))
        .count();
    shared as f64 / longer as f64
}
