use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ecu::{Ecu, EcuType};
use crate::message::{DiagnosticMessage, ServiceId, TestSequence};

/// Outcome of one sequence execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Success,
    Failure,
    Timeout,
}

/// The record of one sequence execution. Produced exactly once;
/// append-only after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub sequence_id: String,
    pub status: TestStatus,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    /// Responses actually received, in step order. A negative response
    /// counts as received; only silence is missing here.
    pub actual_responses: Vec<DiagnosticMessage>,
    pub error_message: Option<String>,
    /// Human-readable execution log, in step order.
    pub logs: Vec<String>,
}

/// Read-only snapshot of the failing step, handed to the diagnosis
/// engine alongside the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub service: ServiceId,
    pub sub_function: String,
    pub target_ecu: String,
    pub ecu_type: EcuType,
    /// 0-based position of the failing step in the sequence.
    pub step_index: usize,
    pub elapsed_ms: u64,
    pub prior_responses: Vec<DiagnosticMessage>,
    /// Copy of the target ECU's state at failure time.
    pub ecu: Ecu,
}

impl FailureContext {
    /// Derive the context for a failing result.
    ///
    /// Returns `None` for successful results and for sequences the
    /// result cannot be located in (diagnosis degrades to an empty
    /// suggestion list rather than erroring).
    pub fn from_failure(sequence: &TestSequence, result: &TestResult, ecu: Ecu) -> Option<Self> {
        if result.status == TestStatus::Success || sequence.messages.is_empty() {
            return None;
        }
        // The failing step is the first one without a response.
        let step_index = result
            .actual_responses
            .len()
            .min(sequence.messages.len() - 1);
        let failing = &sequence.messages[step_index];
        Some(Self {
            service: failing.service,
            sub_function: failing.sub_function.clone(),
            target_ecu: failing.target_ecu.clone(),
            ecu_type: ecu.ecu_type,
            step_index,
            elapsed_ms: result.duration_ms,
            prior_responses: result.actual_responses.clone(),
            ecu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecu::EcuType;

    fn sample_sequence() -> TestSequence {
        TestSequence::new(
            "seq-1",
            "smoke",
            vec![
                DiagnosticMessage::request("m0", ServiceId::SessionControl, "01", None, "engine-1"),
                DiagnosticMessage::request("m1", ServiceId::ReadDataById, "F190", None, "engine-1"),
            ],
            5_000,
        )
    }

    fn failing_result(responses: usize) -> TestResult {
        let seq = sample_sequence();
        TestResult {
            id: "result-0001".into(),
            sequence_id: seq.id.clone(),
            status: TestStatus::Failure,
            timestamp: Utc::now(),
            duration_ms: 120,
            actual_responses: seq.messages[..responses]
                .iter()
                .map(|m| DiagnosticMessage::positive_response_to(m, None))
                .collect(),
            error_message: Some("No response from engine-1 for service 22".into()),
            logs: vec!["Step 0: ok".into()],
        }
    }

    #[test]
    fn test_context_points_at_first_unanswered_step() {
        let seq = sample_sequence();
        let ecu = Ecu::nominal("engine-1", EcuType::Engine);
        let ctx = FailureContext::from_failure(&seq, &failing_result(1), ecu).unwrap();

        assert_eq!(ctx.step_index, 1);
        assert_eq!(ctx.service, ServiceId::ReadDataById);
        assert_eq!(ctx.target_ecu, "engine-1");
        assert_eq!(ctx.prior_responses.len(), 1);
    }

    #[test]
    fn test_context_clamps_to_last_step() {
        // A timeout can land after every response was already received.
        let seq = sample_sequence();
        let ecu = Ecu::nominal("engine-1", EcuType::Engine);
        let mut result = failing_result(2);
        result.status = TestStatus::Timeout;
        let ctx = FailureContext::from_failure(&seq, &result, ecu).unwrap();

        assert_eq!(ctx.step_index, 1);
    }

    #[test]
    fn test_no_context_for_success() {
        let seq = sample_sequence();
        let ecu = Ecu::nominal("engine-1", EcuType::Engine);
        let mut result = failing_result(2);
        result.status = TestStatus::Success;

        assert!(FailureContext::from_failure(&seq, &result, ecu).is_none());
    }

    #[test]
    fn test_no_context_for_empty_sequence() {
        let seq = TestSequence::new("seq-2", "empty", Vec::new(), 1_000);
        let ecu = Ecu::nominal("engine-1", EcuType::Engine);

        assert!(FailureContext::from_failure(&seq, &failing_result(0), ecu).is_none());
    }
}
