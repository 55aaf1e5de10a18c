//! Rule-based matching of a failure against the pattern catalog.
//!
//! Every pattern is evaluated — a failure may match zero, one or
//! several patterns and all matches are kept. Rules inspect the error
//! message case-insensitively and check context predicates
//! independently; nothing here is learned.

use ecusim_model::registry::{TEMP_HARD_LIMIT, VOLTAGE_HARD_LIMIT};
use ecusim_model::{EcuStatus, EcuType, FailureContext, ServiceId, TestResult, TestStatus};

use crate::catalog::{FailurePattern, PatternCatalog};

const SIMILARITY_BASE: f64 = 0.5;
const PREDICATE_BONUS: f64 = 0.15;
const DEGRADED_CONFIDENCE_BOOST: f64 = 1.1;
const DEEP_SEQUENCE_DAMPING: f64 = 0.9;
/// Steps beyond this position count as "deep into the sequence".
const DEEP_SEQUENCE_THRESHOLD: usize = 5;

/// One catalog pattern matched against a concrete failure.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern: FailurePattern,
    pub similarity: f64,
    pub confidence: f64,
}

/// Match `result`/`ctx` against every pattern in the catalog.
pub fn match_patterns(
    catalog: &PatternCatalog,
    result: &TestResult,
    ctx: &FailureContext,
) -> Vec<PatternMatch> {
    let error = result
        .error_message
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    catalog
        .patterns()
        .iter()
        .filter_map(|pattern| {
            let hits = predicate_hits(pattern, &error, result, ctx);
            if hits == 0 {
                return None;
            }

            let similarity = (SIMILARITY_BASE + PREDICATE_BONUS * hits as f64).min(1.0);

            let mut confidence = pattern.success_rate;
            if ctx.ecu.status == EcuStatus::Degraded {
                confidence *= DEGRADED_CONFIDENCE_BOOST;
            }
            if ctx.step_index > DEEP_SEQUENCE_THRESHOLD {
                confidence *= DEEP_SEQUENCE_DAMPING;
            }

            Some(PatternMatch {
                pattern: pattern.clone(),
                similarity,
                confidence: confidence.min(1.0),
            })
        })
        .collect()
}

/// Count the satisfied predicates of one pattern's rule. Zero means no
/// match.
fn predicate_hits(
    pattern: &FailurePattern,
    error: &str,
    result: &TestResult,
    ctx: &FailureContext,
) -> usize {
    let mut hits = 0;
    match pattern.pattern.as_str() {
        "no_response" => {
            if error.contains("no response") {
                hits += 1;
            }
            if error.contains("offline") {
                hits += 1;
            }
            if ctx.ecu.status == EcuStatus::Offline {
                hits += 1;
            }
        }
        "security_denied" => {
            if error.contains("security") || error.contains("access denied") {
                hits += 1;
            }
            if ctx.service == ServiceId::SecurityAccess {
                hits += 1;
            }
        }
        "timeout" => {
            if error.contains("timeout") || error.contains("timed out") {
                hits += 1;
            }
            if result.status == TestStatus::Timeout {
                hits += 1;
            }
        }
        "overheat" => {
            if ctx.ecu.temperature > TEMP_HARD_LIMIT {
                hits += 1;
                if ctx.ecu_type == EcuType::Engine {
                    hits += 1;
                }
            }
            if error.contains("temperature") {
                hits += 1;
            }
        }
        "low_voltage" => {
            if ctx.ecu.voltage < VOLTAGE_HARD_LIMIT {
                hits += 1;
            }
            if error.contains("voltage") {
                hits += 1;
            }
        }
        "gateway_routing" => {
            // Privileged service routed through the gateway.
            if ctx.ecu_type == EcuType::Gateway {
                hits += 1;
                if matches!(
                    ctx.service,
                    ServiceId::SecurityAccess | ServiceId::RoutineControl | ServiceId::WriteDataById
                ) {
                    hits += 1;
                }
            }
        }
        "rejected" => {
            if error.contains("rejected") || error.contains("refused") {
                hits += 1;
                if matches!(
                    ctx.service,
                    ServiceId::WriteDataById | ServiceId::RoutineControl
                ) {
                    hits += 1;
                }
            }
        }
        _ => {}
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ecusim_model::{DiagnosticMessage, Ecu, TestSequence};

    fn failure(error: &str, ecu: Ecu, service: ServiceId, step_index: usize) -> (TestResult, FailureContext) {
        let target = ecu.id.clone();
        let mut messages = Vec::new();
        for i in 0..=step_index {
            messages.push(DiagnosticMessage::request(
                format!("m{i}"),
                service,
                "01",
                None,
                target.clone(),
            ));
        }
        let sequence = TestSequence::new("seq-1", "match test", messages, 5_000);
        let result = TestResult {
            id: "result-0001".into(),
            sequence_id: "seq-1".into(),
            status: TestStatus::Failure,
            timestamp: Utc::now(),
            duration_ms: 300,
            actual_responses: Vec::new(),
            error_message: Some(error.to_string()),
            logs: Vec::new(),
        };
        let mut ctx = FailureContext::from_failure(&sequence, &result, ecu).unwrap();
        ctx.step_index = step_index;
        (result, ctx)
    }

    #[test]
    fn test_offline_failure_matches_connectivity_pattern() {
        let mut ecu = Ecu::nominal("body-1", EcuType::Body);
        ecu.status = EcuStatus::Offline;
        let (result, ctx) = failure(
            "No response from body-1 for service 22: ECU offline",
            ecu,
            ServiceId::ReadDataById,
            0,
        );

        let matches = match_patterns(&PatternCatalog::builtin(), &result, &ctx);
        let silent = matches
            .iter()
            .find(|m| m.pattern.id == "ecu-silent")
            .expect("connectivity pattern should match");
        // all three predicates satisfied
        assert!((silent.similarity - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_security_failure_matches_lockout() {
        let ecu = Ecu::nominal("gateway-1", EcuType::Gateway);
        let (result, ctx) = failure(
            "Security access denied by gateway-1: no response to seed request",
            ecu,
            ServiceId::SecurityAccess,
            1,
        );

        let matches = match_patterns(&PatternCatalog::builtin(), &result, &ctx);
        assert!(matches.iter().any(|m| m.pattern.id == "security-lockout"));
        // privileged service through the gateway also matches routing
        assert!(matches.iter().any(|m| m.pattern.id == "gateway-routing"));
    }

    #[test]
    fn test_multiple_matches_are_all_kept() {
        let mut ecu = Ecu::nominal("engine-1", EcuType::Engine);
        ecu.status = EcuStatus::Offline;
        ecu.temperature = 118.0;
        let (result, ctx) = failure(
            "No response from engine-1 for service 22: ECU offline",
            ecu,
            ServiceId::ReadDataById,
            0,
        );

        let matches = match_patterns(&PatternCatalog::builtin(), &result, &ctx);
        assert!(matches.len() >= 2);
        assert!(matches.iter().any(|m| m.pattern.id == "ecu-silent"));
        assert!(matches.iter().any(|m| m.pattern.id == "engine-overheat"));
    }

    #[test]
    fn test_degraded_unit_boosts_confidence() {
        let online = Ecu::nominal("abs-1", EcuType::Abs);
        let mut degraded = online.clone();
        degraded.status = EcuStatus::Degraded;

        let (result_a, ctx_a) = failure("No response from abs-1", online, ServiceId::ReadDtc, 0);
        let (result_b, ctx_b) = failure("No response from abs-1", degraded, ServiceId::ReadDtc, 0);

        let a = match_patterns(&PatternCatalog::builtin(), &result_a, &ctx_a);
        let b = match_patterns(&PatternCatalog::builtin(), &result_b, &ctx_b);
        let conf_a = a.iter().find(|m| m.pattern.id == "ecu-silent").unwrap().confidence;
        let conf_b = b.iter().find(|m| m.pattern.id == "ecu-silent").unwrap().confidence;
        assert!(conf_b > conf_a);
    }

    #[test]
    fn test_deep_failures_are_damped() {
        let ecu = Ecu::nominal("abs-1", EcuType::Abs);
        let (result_a, ctx_a) = failure("No response from abs-1", ecu.clone(), ServiceId::ReadDtc, 0);
        let (result_b, ctx_b) = failure("No response from abs-1", ecu, ServiceId::ReadDtc, 6);

        let a = match_patterns(&PatternCatalog::builtin(), &result_a, &ctx_a);
        let b = match_patterns(&PatternCatalog::builtin(), &result_b, &ctx_b);
        let conf_a = a.iter().find(|m| m.pattern.id == "ecu-silent").unwrap().confidence;
        let conf_b = b.iter().find(|m| m.pattern.id == "ecu-silent").unwrap().confidence;
        assert!(conf_b < conf_a);
    }

    #[test]
    fn test_unrelated_failure_matches_nothing() {
        let ecu = Ecu::nominal("body-1", EcuType::Body);
        let (result, ctx) = failure("internal bookkeeping fault", ecu, ServiceId::SessionControl, 0);

        let matches = match_patterns(&PatternCatalog::builtin(), &result, &ctx);
        assert!(matches.is_empty());
    }

    #[test]
    fn test_similarity_capped_at_one() {
        let mut ecu = Ecu::nominal("engine-1", EcuType::Engine);
        ecu.temperature = 125.0;
        let (result, ctx) = failure(
            "no response: temperature above limit",
            ecu,
            ServiceId::ReadDataById,
            0,
        );
        for m in match_patterns(&PatternCatalog::builtin(), &result, &ctx) {
            assert!(m.similarity <= 1.0);
            assert!(m.confidence <= 1.0);
        }
    }
}
