//! Single-pass sequence executor.
//!
//! Drives a request list left to right, no reordering, no retries.
//! The only suspension point is the simulated network delay before
//! each response; cancellation and the declared sequence timeout are
//! checked there. Silence terminates a run; a negative response is a
//! completed round-trip and the run continues.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tokio::time::{sleep, Instant};

use ecusim_model::registry::{TEMP_HARD_LIMIT, VOLTAGE_HARD_LIMIT};
use ecusim_model::rng::run_rng;
use ecusim_model::{
    failure_probability_for, DiagnosticMessage, Ecu, EcuRegistry, EcuStatus, EcuType, ServiceId,
    TestResult, TestSequence, TestStatus,
};
use ecusim_protocol::respond;

use crate::cancel::CancelToken;

/// Delay-model tuning. Defaults approximate a healthy vehicle bus.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Seed for per-run RNGs; combined with the run index.
    pub seed: u64,
    pub base_delay_ms: u64,
    /// Extra cost of security, routine and write operations.
    pub slow_service_surcharge_ms: u64,
    /// Extra hop when the target sits behind gateway routing.
    pub gateway_surcharge_ms: u64,
    /// Speed bonus on the fast read paths.
    pub fast_read_bonus_ms: u64,
    /// Upper bound of the uniform jitter added per step.
    pub jitter_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            base_delay_ms: 40,
            slow_service_surcharge_ms: 25,
            gateway_surcharge_ms: 20,
            fast_read_bonus_ms: 15,
            jitter_ms: 10,
        }
    }
}

/// Executes sequences against a shared registry.
pub struct SequenceExecutor {
    registry: Arc<EcuRegistry>,
    config: ExecutorConfig,
}

impl SequenceExecutor {
    pub fn new(registry: Arc<EcuRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<EcuRegistry> {
        &self.registry
    }

    /// Run one sequence to completion, timeout, cancellation or first
    /// silence. `on_progress` fires once per step, before the step's
    /// outcome is known.
    pub async fn execute(
        &self,
        sequence: &TestSequence,
        result_id: impl Into<String>,
        run_index: u64,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(f64, usize),
    ) -> TestResult {
        let mut rng = run_rng(self.config.seed, run_index);
        let started = Instant::now();
        let timestamp = Utc::now();
        let deadline = started + Duration::from_millis(sequence.timeout_ms);
        let total = sequence.messages.len();

        let mut responses: Vec<DiagnosticMessage> = Vec::with_capacity(total);
        let mut logs: Vec<String> = Vec::new();
        let mut status = TestStatus::Success;
        let mut error_message: Option<String> = None;

        for (index, request) in sequence.messages.iter().enumerate() {
            on_progress(index as f64 / total as f64 * 100.0, index);

            let Some(ecu) = self.registry.simulate_step(&request.target_ecu) else {
                // Validation upstream makes this unreachable in
                // practice; treat it as silence from a ghost unit.
                status = TestStatus::Failure;
                error_message = Some(format!("unknown target ECU: {}", request.target_ecu));
                break;
            };
            logs.push(format!(
                "Step {index}: {} ({}) -> {} [status={}, temp={:.1}C, voltage={:.2}V]",
                request.service.name(),
                request.service,
                request.target_ecu,
                ecu.status,
                ecu.temperature,
                ecu.voltage,
            ));

            let delay = self.step_delay(request.service, ecu.ecu_type, &mut rng);
            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(delay.min(remaining)).await;

            if cancel.is_cancelled() {
                status = TestStatus::Failure;
                let reason = "Execution cancelled by caller".to_string();
                logs.push(reason.clone());
                error_message = Some(reason);
                break;
            }
            if Instant::now() >= deadline {
                status = TestStatus::Timeout;
                let reason =
                    format!("Sequence timed out after {} ms budget", sequence.timeout_ms);
                logs.push(reason.clone());
                error_message = Some(reason);
                break;
            }

            let failure_probability =
                failure_probability_for(&ecu, request.service, self.registry.config());
            match respond(request, &ecu, failure_probability, &mut rng) {
                Some(response) => {
                    self.registry.mark_responded(&request.target_ecu, Utc::now());
                    logs.push(response_log(&response));
                    responses.push(response);
                }
                None => {
                    let reason = no_response_reason(&ecu, request);
                    logs.push(reason.clone());
                    status = TestStatus::Failure;
                    error_message = Some(reason);
                    break;
                }
            }
        }

        TestResult {
            id: result_id.into(),
            sequence_id: sequence.id.clone(),
            status,
            timestamp,
            duration_ms: started.elapsed().as_millis() as u64,
            actual_responses: responses,
            error_message,
            logs,
        }
    }

    fn step_delay(&self, service: ServiceId, ecu_type: EcuType, rng: &mut ChaCha8Rng) -> Duration {
        let c = &self.config;
        let mut ms = c.base_delay_ms as i64;
        if matches!(
            service,
            ServiceId::SecurityAccess | ServiceId::RoutineControl | ServiceId::WriteDataById
        ) {
            ms += c.slow_service_surcharge_ms as i64;
        }
        if ecu_type == EcuType::Gateway {
            ms += c.gateway_surcharge_ms as i64;
        }
        if matches!(service, ServiceId::ReadDataById | ServiceId::ReadDtc) {
            ms -= c.fast_read_bonus_ms as i64;
        }
        ms += rng.gen_range(0..=c.jitter_ms) as i64;
        Duration::from_millis(ms.max(5) as u64)
    }
}

fn response_log(response: &DiagnosticMessage) -> String {
    if response.is_negative() {
        let nrc = response
            .nrc()
            .map(|n| n.description())
            .unwrap_or("unknown reason");
        format!(
            "Negative response from {}: {} (data {})",
            response.target_ecu,
            nrc,
            response.data.as_deref().unwrap_or("-"),
        )
    } else {
        format!(
            "Positive response {:02X} from {} (data {})",
            response.service.positive_response_code(),
            response.target_ecu,
            response.data.as_deref().unwrap_or("-"),
        )
    }
}

/// Why a unit stayed silent, derived from its state at the failing
/// step.
fn no_response_reason(ecu: &Ecu, request: &DiagnosticMessage) -> String {
    match ecu.status {
        EcuStatus::Offline => format!(
            "No response from {} for service {}: ECU offline",
            ecu.id, request.service
        ),
        EcuStatus::Degraded => {
            let mut reasons = Vec::new();
            if ecu.temperature > TEMP_HARD_LIMIT {
                reasons.push(format!("temperature {:.1} C above limit", ecu.temperature));
            }
            if ecu.voltage < VOLTAGE_HARD_LIMIT {
                reasons.push(format!("voltage {:.2} V below limit", ecu.voltage));
            }
            if !ecu.error_codes.is_empty() {
                reasons.push(format!("stored codes {}", ecu.error_codes.join(", ")));
            }
            if reasons.is_empty() {
                reasons.push("degraded state".to_string());
            }
            format!(
                "No response from {} for service {}: degraded ({})",
                ecu.id,
                request.service,
                reasons.join("; ")
            )
        }
        EcuStatus::Online => match request.service {
            ServiceId::SecurityAccess => format!(
                "Security access denied by {}: no response to seed request",
                ecu.id
            ),
            ServiceId::WriteDataById => format!(
                "Write rejected by {}: no response for identifier {}",
                ecu.id, request.sub_function
            ),
            ServiceId::RoutineControl => {
                format!("Routine refused by {}: no response", ecu.id)
            }
            _ => format!(
                "No response from {} for service {}",
                ecu.id, request.service
            ),
        },
    }
}
