//! Execution manager: the dependency-injected facade the transport
//! layer talks to.
//!
//! Owns the results store and id allocation, wires failing runs into
//! the diagnosis engine, and exposes spawn-with-progress for
//! concurrent callers. Every service it holds is shared state passed
//! in at construction; there are no process-wide singletons.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ecusim_diagnose::{
    DiagnosisEngine, FailureHistory, PatternCatalog, SimilarFailureSuggestion,
};
use ecusim_model::{
    Ecu, EcuRegistry, FailureContext, RegistryConfig, TestResult, TestSequence, TestStatus,
};

use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::executor::{ExecutorConfig, SequenceExecutor};

/// One progress notification: percent complete on entering `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub percent: f64,
    pub step: usize,
}

/// Handle to a sequence running as its own task.
pub struct RunningSequence {
    pub progress: mpsc::Receiver<ProgressEvent>,
    pub cancel: CancelToken,
    pub handle: JoinHandle<TestResult>,
}

pub struct ExecutionManager {
    registry: Arc<EcuRegistry>,
    executor: SequenceExecutor,
    diagnosis: DiagnosisEngine,
    results: Mutex<Vec<TestResult>>,
    suggestions: Mutex<HashMap<String, Vec<SimilarFailureSuggestion>>>,
    next_id: Mutex<u64>,
    run_counter: AtomicU64,
}

impl ExecutionManager {
    pub fn new(
        registry: Arc<EcuRegistry>,
        catalog: Arc<PatternCatalog>,
        history: Arc<FailureHistory>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            executor: SequenceExecutor::new(Arc::clone(&registry), config),
            diagnosis: DiagnosisEngine::new(catalog, history),
            registry,
            results: Mutex::new(Vec::new()),
            suggestions: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
            run_counter: AtomicU64::new(0),
        }
    }

    /// Default fleet, built-in catalog, empty history.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(EcuRegistry::with_default_fleet(RegistryConfig::default())),
            Arc::new(PatternCatalog::builtin()),
            Arc::new(FailureHistory::new()),
            ExecutorConfig::default(),
        )
    }

    pub fn registry(&self) -> &Arc<EcuRegistry> {
        &self.registry
    }

    /// Execute one sequence inline. Validation faults become a
    /// synthetic failing result; this method never errors.
    pub async fn run_sequence(
        &self,
        sequence: &TestSequence,
        cancel: &CancelToken,
        on_progress: impl FnMut(f64, usize),
    ) -> TestResult {
        let result_id = self.allocate_result_id();

        if let Err(fault) = self.validate(sequence) {
            log::warn!("sequence {} rejected: {fault}", sequence.id);
            let result = synthetic_failure(result_id, sequence, &fault);
            self.finish(sequence, result.clone());
            return result;
        }

        let run_index = self.run_counter.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "executing sequence {} ({} steps) as {result_id}",
            sequence.id,
            sequence.messages.len()
        );
        let result = self
            .executor
            .execute(sequence, result_id, run_index, cancel, on_progress)
            .await;
        log::info!(
            "sequence {} finished: {:?} in {} ms",
            sequence.id,
            result.status,
            result.duration_ms
        );
        self.finish(sequence, result.clone());
        result
    }

    /// Execute as an independent task, with progress over a channel
    /// and the result as the completion event.
    pub fn spawn_sequence(self: &Arc<Self>, sequence: TestSequence) -> RunningSequence {
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancelToken::new();
        let manager = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            manager
                .run_sequence(&sequence, &token, move |percent, step| {
                    let _ = tx.try_send(ProgressEvent { percent, step });
                })
                .await
        });
        RunningSequence {
            progress: rx,
            cancel,
            handle,
        }
    }

    /// All results, insertion order.
    pub fn results(&self) -> Vec<TestResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn result(&self, id: &str) -> Option<TestResult> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Ranked suggestions attached to a failing result; empty for
    /// successes and unknown ids.
    pub fn suggestions_for(&self, result_id: &str) -> Vec<SimilarFailureSuggestion> {
        self.suggestions
            .lock()
            .unwrap()
            .get(result_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn ecu(&self, id: &str) -> Option<Ecu> {
        self.registry.get(id)
    }

    pub fn ecus(&self) -> Vec<Ecu> {
        self.registry.all()
    }

    fn allocate_result_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        let id = format!("result-{:04}", *next);
        *next += 1;
        id
    }

    fn validate(&self, sequence: &TestSequence) -> Result<(), EngineError> {
        if sequence.name.trim().is_empty() {
            return Err(EngineError::EmptyName);
        }
        if sequence.messages.is_empty() {
            return Err(EngineError::EmptySequence {
                id: sequence.id.clone(),
            });
        }
        for message in &sequence.messages {
            if self.registry.get(&message.target_ecu).is_none() {
                return Err(EngineError::UnknownEcu {
                    id: message.target_ecu.clone(),
                });
            }
        }
        Ok(())
    }

    /// Record the result; on failure, diagnose first and only then add
    /// the run to the history so it is never its own neighbor.
    fn finish(&self, sequence: &TestSequence, result: TestResult) {
        if result.status != TestStatus::Success {
            let ranked = self
                .derive_context(sequence, &result)
                .map(|ctx| self.diagnosis.diagnose(&result, &ctx))
                .unwrap_or_default();
            self.suggestions
                .lock()
                .unwrap()
                .insert(result.id.clone(), ranked);
            self.diagnosis.history().record(result.clone());
        }
        self.results.lock().unwrap().push(result);
    }

    fn derive_context(
        &self,
        sequence: &TestSequence,
        result: &TestResult,
    ) -> Option<FailureContext> {
        let step = result
            .actual_responses
            .len()
            .min(sequence.messages.len().checked_sub(1)?);
        let ecu = self.registry.get(&sequence.messages[step].target_ecu)?;
        FailureContext::from_failure(sequence, result, ecu)
    }
}

fn synthetic_failure(id: String, sequence: &TestSequence, fault: &EngineError) -> TestResult {
    TestResult {
        id,
        sequence_id: sequence.id.clone(),
        status: TestStatus::Failure,
        timestamp: Utc::now(),
        duration_ms: 0,
        actual_responses: Vec::new(),
        error_message: Some(format!("Internal error: {fault}")),
        logs: vec![format!("Sequence rejected before execution: {fault}")],
    }
}
