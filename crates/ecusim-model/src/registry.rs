use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::ecu::{Ecu, EcuStatus, EcuType};
use crate::message::ServiceId;
use crate::rng::slot_rng;

/// Hard degradation thresholds. Crossing either marks the unit
/// degraded and stores a synthetic trouble code.
pub const TEMP_HARD_LIMIT: f64 = 110.0;
pub const VOLTAGE_HARD_LIMIT: f64 = 12.2;

/// Soft thresholds, tighter than the hard ones. They only raise the
/// failure probability.
pub const TEMP_SOFT_LIMIT: f64 = 100.0;
pub const VOLTAGE_SOFT_LIMIT: f64 = 12.5;

const VOLTAGE_MIN: f64 = 11.5;
const VOLTAGE_MAX: f64 = 15.0;
const VOLTAGE_STEP: f64 = 0.15;

const DTC_OVERHEAT: &str = "P0217";
const DTC_UNDERVOLTAGE: &str = "U0041";

/// Tuning knobs for the stochastic state model.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Seed for every slot RNG. Same seed -> same fleet trajectory.
    pub seed: u64,
    /// Failure probability floor for a healthy unit.
    pub base_failure_rate: f64,
    /// Additive penalty while degraded.
    pub degraded_penalty: f64,
    /// Per-step chance of a transient network incident forcing the
    /// unit offline, independent of thresholds.
    pub incident_probability: f64,
    /// Per-step chance that an offline unit comes back.
    pub recovery_probability: f64,
    /// Ceiling for environment-driven failure probability. Only an
    /// offline unit is certain to stay silent.
    pub failure_cap: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            base_failure_rate: 0.10,
            degraded_penalty: 0.30,
            incident_probability: 0.05,
            recovery_probability: 0.30,
            failure_cap: 0.90,
        }
    }
}

struct EcuSlot {
    ecu: Ecu,
    rng: ChaCha8Rng,
}

/// Holds the fleet and evolves per-unit physical state.
///
/// One slot per ECU, each behind its own mutex: a simulation step for a
/// unit is a single critical section, so concurrent sequences targeting
/// the same unit cannot interleave one step's mutations.
pub struct EcuRegistry {
    slots: Vec<Mutex<EcuSlot>>,
    index: HashMap<String, usize>,
    config: RegistryConfig,
}

impl EcuRegistry {
    /// Six units, one per type, in nominal condition.
    pub fn with_default_fleet(config: RegistryConfig) -> Self {
        let ecus = EcuType::ALL
            .iter()
            .map(|t| Ecu::nominal(format!("{}-1", t.as_str()), *t))
            .collect();
        Self::with_ecus(ecus, config)
    }

    /// Custom fleet, e.g. for isolated test instances.
    pub fn with_ecus(ecus: Vec<Ecu>, config: RegistryConfig) -> Self {
        let index = ecus
            .iter()
            .enumerate()
            .map(|(i, ecu)| (ecu.id.clone(), i))
            .collect();
        let slots = ecus
            .into_iter()
            .enumerate()
            .map(|(i, ecu)| {
                Mutex::new(EcuSlot {
                    ecu,
                    rng: slot_rng(config.seed, i as u64),
                })
            })
            .collect();
        Self {
            slots,
            index,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of one unit.
    pub fn get(&self, id: &str) -> Option<Ecu> {
        let &i = self.index.get(id)?;
        Some(self.slots[i].lock().unwrap().ecu.clone())
    }

    /// Snapshots of the whole fleet, in registration order.
    pub fn all(&self) -> Vec<Ecu> {
        self.slots
            .iter()
            .map(|slot| slot.lock().unwrap().ecu.clone())
            .collect()
    }

    /// Advance one unit's physical state by one tick and return the
    /// post-step snapshot.
    pub fn simulate_step(&self, id: &str) -> Option<Ecu> {
        let &i = self.index.get(id)?;
        let mut slot = self.slots[i].lock().unwrap();
        let slot = &mut *slot;
        step_ecu(&mut slot.ecu, &mut slot.rng, &self.config);
        Some(slot.ecu.clone())
    }

    /// Force a unit offline, as an operator-injected network incident.
    /// It recovers the same way a random incident does.
    pub fn inject_incident(&self, id: &str) -> Option<Ecu> {
        let &i = self.index.get(id)?;
        let mut slot = self.slots[i].lock().unwrap();
        slot.ecu.status = EcuStatus::Offline;
        Some(slot.ecu.clone())
    }

    /// Record that a unit answered a request at `at`.
    pub fn mark_responded(&self, id: &str, at: DateTime<Utc>) {
        if let Some(&i) = self.index.get(id) {
            self.slots[i].lock().unwrap().ecu.last_response_at = Some(at);
        }
    }

    /// Probability that `id` stays silent for one request of `service`.
    pub fn failure_probability(&self, id: &str, service: ServiceId) -> Option<f64> {
        let ecu = self.get(id)?;
        Some(failure_probability_for(&ecu, service, &self.config))
    }
}

/// One random-walk tick for a single unit.
fn step_ecu(ecu: &mut Ecu, rng: &mut ChaCha8Rng, config: &RegistryConfig) {
    let (temp_min, temp_max, temp_step) = ecu.ecu_type.temperature_band();
    ecu.temperature = (ecu.temperature + rng.gen_range(-temp_step..=temp_step))
        .clamp(temp_min, temp_max);
    ecu.voltage =
        (ecu.voltage + rng.gen_range(-VOLTAGE_STEP..=VOLTAGE_STEP)).clamp(VOLTAGE_MIN, VOLTAGE_MAX);

    let over_temp = ecu.temperature > TEMP_HARD_LIMIT;
    let under_volt = ecu.voltage < VOLTAGE_HARD_LIMIT;
    if over_temp && !ecu.error_codes.iter().any(|c| c == DTC_OVERHEAT) {
        ecu.error_codes.push(DTC_OVERHEAT.to_string());
    }
    if under_volt && !ecu.error_codes.iter().any(|c| c == DTC_UNDERVOLTAGE) {
        ecu.error_codes.push(DTC_UNDERVOLTAGE.to_string());
    }

    if ecu.status == EcuStatus::Offline {
        // Sticky until the recovery draw succeeds; then the status is
        // recomputed from the thresholds.
        if rng.gen::<f64>() < config.recovery_probability {
            ecu.status = threshold_status(over_temp, under_volt);
        }
        return;
    }

    // Transient network incident, independent of thresholds.
    if rng.gen::<f64>() < config.incident_probability {
        ecu.status = EcuStatus::Offline;
        return;
    }

    ecu.status = threshold_status(over_temp, under_volt);
}

fn threshold_status(over_temp: bool, under_volt: bool) -> EcuStatus {
    if over_temp || under_volt {
        EcuStatus::Degraded
    } else {
        EcuStatus::Online
    }
}

/// Probability in [0, 1] that `ecu` stays silent for one request of
/// `service`. Pure; monotone non-decreasing along
/// online -> degraded -> offline.
pub fn failure_probability_for(ecu: &Ecu, service: ServiceId, config: &RegistryConfig) -> f64 {
    if ecu.status == EcuStatus::Offline {
        return 1.0;
    }

    let mut p = config.base_failure_rate;
    if ecu.status == EcuStatus::Degraded {
        p += config.degraded_penalty;
    }

    // Type/service adjustments: routine reads on the engine are the
    // best-trodden path; security access through the gateway crosses a
    // routing hop and a lockout counter.
    match (ecu.ecu_type, service) {
        (EcuType::Engine, ServiceId::ReadDataById) => p -= 0.05,
        (EcuType::Gateway, ServiceId::SecurityAccess) => p += 0.15,
        _ => {}
    }

    if ecu.temperature > TEMP_SOFT_LIMIT {
        p += 0.10;
    }
    if ecu.voltage < VOLTAGE_SOFT_LIMIT {
        p += 0.10;
    }

    p.clamp(0.0, config.failure_cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> RegistryConfig {
        RegistryConfig {
            base_failure_rate: 0.0,
            incident_probability: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_fleet_has_one_per_type() {
        let registry = EcuRegistry::with_default_fleet(RegistryConfig::default());
        assert_eq!(registry.len(), 6);
        assert!(registry.get("engine-1").is_some());
        assert!(registry.get("gateway-1").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_simulate_step_stays_in_band() {
        let registry = EcuRegistry::with_default_fleet(quiet_config());
        let (min, max, _) = EcuType::Engine.temperature_band();

        for _ in 0..500 {
            let ecu = registry.simulate_step("engine-1").unwrap();
            assert!(ecu.temperature >= min && ecu.temperature <= max);
            assert!(ecu.voltage >= VOLTAGE_MIN && ecu.voltage <= VOLTAGE_MAX);
        }
    }

    #[test]
    fn test_steps_are_deterministic_for_a_seed() {
        let a = EcuRegistry::with_default_fleet(RegistryConfig::default());
        let b = EcuRegistry::with_default_fleet(RegistryConfig::default());

        for _ in 0..50 {
            let ea = a.simulate_step("abs-1").unwrap();
            let eb = b.simulate_step("abs-1").unwrap();
            assert_eq!(ea.temperature, eb.temperature);
            assert_eq!(ea.voltage, eb.voltage);
            assert_eq!(ea.status, eb.status);
        }
    }

    #[test]
    fn test_incident_rate_roughly_matches_config() {
        let registry = EcuRegistry::with_default_fleet(RegistryConfig {
            incident_probability: 0.05,
            recovery_probability: 1.0,
            ..Default::default()
        });

        // With instant recovery every step is an independent 5% draw.
        let mut incidents = 0;
        for _ in 0..1000 {
            let ecu = registry.simulate_step("body-1").unwrap();
            if ecu.status == EcuStatus::Offline {
                incidents += 1;
            }
        }
        assert!(
            (10..150).contains(&incidents),
            "expected ~50 incidents, saw {incidents}"
        );
    }

    #[test]
    fn test_offline_is_sticky_without_recovery() {
        let registry = EcuRegistry::with_default_fleet(RegistryConfig {
            incident_probability: 0.0,
            recovery_probability: 0.0,
            ..Default::default()
        });
        registry.inject_incident("airbag-1").unwrap();

        for _ in 0..20 {
            let ecu = registry.simulate_step("airbag-1").unwrap();
            assert_eq!(ecu.status, EcuStatus::Offline);
        }
    }

    #[test]
    fn test_offline_recovers_with_certain_draw() {
        let registry = EcuRegistry::with_default_fleet(RegistryConfig {
            incident_probability: 0.0,
            recovery_probability: 1.0,
            ..Default::default()
        });
        registry.inject_incident("body-1").unwrap();

        let ecu = registry.simulate_step("body-1").unwrap();
        assert_ne!(ecu.status, EcuStatus::Offline);
    }

    #[test]
    fn test_failure_probability_monotone_over_status() {
        let config = RegistryConfig::default();
        let mut ecu = Ecu::nominal("transmission-1", EcuType::Transmission);

        let online = failure_probability_for(&ecu, ServiceId::ReadDataById, &config);
        ecu.status = EcuStatus::Degraded;
        let degraded = failure_probability_for(&ecu, ServiceId::ReadDataById, &config);
        ecu.status = EcuStatus::Offline;
        let offline = failure_probability_for(&ecu, ServiceId::ReadDataById, &config);

        assert!(online < degraded);
        assert!(degraded < offline);
        assert_eq!(offline, 1.0);
    }

    #[test]
    fn test_offline_probability_is_certain() {
        let config = RegistryConfig::default();
        let mut ecu = Ecu::nominal("engine-1", EcuType::Engine);
        ecu.status = EcuStatus::Offline;

        assert_eq!(
            failure_probability_for(&ecu, ServiceId::SessionControl, &config),
            1.0
        );
    }

    #[test]
    fn test_engine_reads_are_more_reliable() {
        let config = RegistryConfig::default();
        let ecu = Ecu::nominal("engine-1", EcuType::Engine);

        let read = failure_probability_for(&ecu, ServiceId::ReadDataById, &config);
        let session = failure_probability_for(&ecu, ServiceId::SessionControl, &config);
        assert!(read < session);
    }

    #[test]
    fn test_gateway_security_is_less_reliable() {
        let config = RegistryConfig::default();
        let gateway = Ecu::nominal("gateway-1", EcuType::Gateway);
        let body = Ecu::nominal("body-1", EcuType::Body);

        let via_gateway = failure_probability_for(&gateway, ServiceId::SecurityAccess, &config);
        let direct = failure_probability_for(&body, ServiceId::SecurityAccess, &config);
        assert!(via_gateway > direct);
    }

    #[test]
    fn test_soft_thresholds_add_penalties() {
        let config = RegistryConfig::default();
        let mut ecu = Ecu::nominal("engine-1", EcuType::Engine);
        let baseline = failure_probability_for(&ecu, ServiceId::SessionControl, &config);

        ecu.temperature = TEMP_SOFT_LIMIT + 2.0;
        let hot = failure_probability_for(&ecu, ServiceId::SessionControl, &config);
        assert!((hot - baseline - 0.10).abs() < 1e-9);

        ecu.voltage = VOLTAGE_SOFT_LIMIT - 0.2;
        let hot_and_low = failure_probability_for(&ecu, ServiceId::SessionControl, &config);
        assert!((hot_and_low - baseline - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_environment_never_reaches_certainty() {
        let config = RegistryConfig::default();
        let mut ecu = Ecu::nominal("gateway-1", EcuType::Gateway);
        ecu.status = EcuStatus::Degraded;
        ecu.temperature = 125.0;
        ecu.voltage = 11.6;

        let p = failure_probability_for(&ecu, ServiceId::SecurityAccess, &config);
        assert!(p <= config.failure_cap);
    }

    #[test]
    fn test_hard_threshold_stores_dtc_once() {
        let mut ecu = Ecu::nominal("engine-1", EcuType::Engine);
        ecu.temperature = 129.0;
        let mut rng = slot_rng(7, 0);
        let config = quiet_config();

        // Drive enough steps that the walk cannot fall below the limit.
        for _ in 0..3 {
            ecu.temperature = 129.0;
            step_ecu(&mut ecu, &mut rng, &config);
        }

        let overheats = ecu.error_codes.iter().filter(|c| *c == DTC_OVERHEAT).count();
        assert_eq!(overheats, 1);
        assert_eq!(ecu.status, EcuStatus::Degraded);
    }
}
