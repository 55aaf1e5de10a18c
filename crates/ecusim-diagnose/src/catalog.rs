use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad class of a known failure signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Connectivity,
    Protocol,
    EcuSpecific,
    Environmental,
    Security,
    Timing,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Connectivity => "connectivity",
            FailureCategory::Protocol => "protocol",
            FailureCategory::EcuSpecific => "ecu_specific",
            FailureCategory::Environmental => "environmental",
            FailureCategory::Security => "security",
            FailureCategory::Timing => "timing",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One known failure signature with its field-proven fixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePattern {
    pub id: String,
    pub category: FailureCategory,
    /// Trigger tag selecting the matching rule for this pattern.
    pub pattern: String,
    pub description: String,
    pub common_causes: Vec<String>,
    pub resolution_steps: Vec<String>,
    pub average_fix_time_min: u32,
    /// Fraction of past cases the resolution steps fixed, in [0, 1].
    pub success_rate: f64,
}

/// Static catalog of known failure patterns. Loaded once at startup,
/// never mutated at runtime — safe to share without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCatalog {
    patterns: Vec<FailurePattern>,
}

impl PatternCatalog {
    pub fn new(patterns: Vec<FailurePattern>) -> Self {
        Self { patterns }
    }

    /// Load a catalog override from JSON (an array of patterns).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let patterns: Vec<FailurePattern> = serde_json::from_str(json)?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[FailurePattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        let patterns = vec![
            FailurePattern {
                id: "ecu-silent".into(),
                category: FailureCategory::Connectivity,
                pattern: "no_response".into(),
                description: "ECU does not answer on the diagnostic bus".into(),
                common_causes: vec![
                    "Broken or chafed bus wiring".into(),
                    "Blown supply fuse".into(),
                    "ECU in bootloader after interrupted flash".into(),
                ],
                resolution_steps: vec![
                    "Check the supply fuse and ground strap of the unit".into(),
                    "Inspect bus wiring between the unit and the gateway".into(),
                    "Power-cycle the unit and retry the sequence".into(),
                ],
                average_fix_time_min: 45,
                success_rate: 0.85,
            },
            FailurePattern {
                id: "security-lockout".into(),
                category: FailureCategory::Security,
                pattern: "security_denied".into(),
                description: "Security access rejected or locked out".into(),
                common_causes: vec![
                    "Wrong key algorithm for this unit generation".into(),
                    "Lockout timer from earlier failed attempts".into(),
                    "Session dropped before key submission".into(),
                ],
                resolution_steps: vec![
                    "Wait out the security lockout delay before retrying".into(),
                    "Verify the seed/key algorithm variant for the unit".into(),
                    "Re-enter the extended session and repeat the handshake".into(),
                ],
                average_fix_time_min: 20,
                success_rate: 0.75,
            },
            FailurePattern {
                id: "bus-timeout".into(),
                category: FailureCategory::Timing,
                pattern: "timeout".into(),
                description: "Sequence exceeded its declared time budget".into(),
                common_causes: vec![
                    "Bus congestion from a chattering node".into(),
                    "Undersized sequence timeout for gateway routing".into(),
                ],
                resolution_steps: vec![
                    "Retry with a larger sequence timeout".into(),
                    "Check the bus for a node flooding the network".into(),
                ],
                average_fix_time_min: 15,
                success_rate: 0.70,
            },
            FailurePattern {
                id: "engine-overheat".into(),
                category: FailureCategory::Environmental,
                pattern: "overheat".into(),
                description: "Unit operating above its temperature limit".into(),
                common_causes: vec![
                    "Cooling system fault".into(),
                    "Sensor drift reporting phantom heat".into(),
                ],
                resolution_steps: vec![
                    "Let the unit cool below the operating limit".into(),
                    "Check coolant level and fan operation".into(),
                    "Clear stored codes and re-run the sequence".into(),
                ],
                average_fix_time_min: 60,
                success_rate: 0.80,
            },
            FailurePattern {
                id: "supply-undervoltage".into(),
                category: FailureCategory::Environmental,
                pattern: "low_voltage".into(),
                description: "Supply voltage below the diagnostic minimum".into(),
                common_causes: vec![
                    "Weak battery under cranking load".into(),
                    "Corroded ground connection".into(),
                ],
                resolution_steps: vec![
                    "Connect a charger and hold the supply above 12.5 V".into(),
                    "Inspect battery terminals and ground points".into(),
                ],
                average_fix_time_min: 30,
                success_rate: 0.90,
            },
            FailurePattern {
                id: "gateway-routing".into(),
                category: FailureCategory::EcuSpecific,
                pattern: "gateway_routing".into(),
                description: "Privileged request lost in gateway routing".into(),
                common_causes: vec![
                    "Gateway firewall dropping privileged services".into(),
                    "Routing table missing the target address".into(),
                ],
                resolution_steps: vec![
                    "Verify the gateway routing table for the target".into(),
                    "Retry the request addressed directly to the unit".into(),
                ],
                average_fix_time_min: 40,
                success_rate: 0.65,
            },
            FailurePattern {
                id: "service-rejected".into(),
                category: FailureCategory::Protocol,
                pattern: "rejected".into(),
                description: "Unit refuses the requested operation".into(),
                common_causes: vec![
                    "Operation not allowed in the active session".into(),
                    "Identifier outside the writable range".into(),
                ],
                resolution_steps: vec![
                    "Enter the extended session before the operation".into(),
                    "Verify the identifier against the unit's data dictionary".into(),
                ],
                average_fix_time_min: 25,
                success_rate: 0.72,
            },
        ];
        Self { patterns }
    }
}
