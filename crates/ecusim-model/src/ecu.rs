use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of simulated ECU reachable on the diagnostic bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcuType {
    Engine,
    Transmission,
    Body,
    Gateway,
    Abs,
    Airbag,
}

impl EcuType {
    /// Every type, in default-fleet registration order.
    pub const ALL: [EcuType; 6] = [
        EcuType::Engine,
        EcuType::Transmission,
        EcuType::Body,
        EcuType::Gateway,
        EcuType::Abs,
        EcuType::Airbag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EcuType::Engine => "engine",
            EcuType::Transmission => "transmission",
            EcuType::Body => "body",
            EcuType::Gateway => "gateway",
            EcuType::Abs => "abs",
            EcuType::Airbag => "airbag",
        }
    }

    /// Nominal operating temperature in °C for a freshly registered unit.
    pub fn nominal_temperature(&self) -> f64 {
        match self {
            EcuType::Engine => 90.0,
            EcuType::Transmission => 75.0,
            EcuType::Body => 40.0,
            EcuType::Gateway => 50.0,
            EcuType::Abs => 45.0,
            EcuType::Airbag => 35.0,
        }
    }

    /// Temperature random-walk band: (min, max, max step per tick).
    ///
    /// Powertrain units run hotter and swing harder than cabin
    /// electronics.
    pub fn temperature_band(&self) -> (f64, f64, f64) {
        match self {
            EcuType::Engine => (70.0, 130.0, 3.0),
            EcuType::Transmission => (60.0, 125.0, 2.5),
            EcuType::Body => (20.0, 90.0, 1.0),
            EcuType::Gateway => (25.0, 100.0, 1.5),
            EcuType::Abs => (20.0, 105.0, 1.5),
            EcuType::Airbag => (20.0, 85.0, 1.0),
        }
    }
}

impl fmt::Display for EcuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network/health status of a simulated ECU.
///
/// Status is derived from temperature, voltage and injected incidents
/// during simulation steps; it is never set directly by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcuStatus {
    Online,
    Degraded,
    Offline,
}

impl EcuStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EcuStatus::Online => "online",
            EcuStatus::Degraded => "degraded",
            EcuStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for EcuStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single simulated ECU.
///
/// Owned exclusively by the registry; mutated only during simulation
/// steps for this unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ecu {
    pub id: String,
    pub ecu_type: EcuType,
    pub status: EcuStatus,
    /// Current temperature in °C.
    pub temperature: f64,
    /// Supply voltage in V.
    pub voltage: f64,
    /// Highest security level granted through a completed seed/key
    /// handshake.
    pub security_level: u8,
    /// Stored diagnostic trouble codes, oldest first.
    pub error_codes: Vec<String>,
    pub last_response_at: Option<DateTime<Utc>>,
}

impl Ecu {
    /// A unit in nominal condition: online, type-nominal temperature,
    /// healthy supply voltage, security level 1, no stored codes.
    pub fn nominal(id: impl Into<String>, ecu_type: EcuType) -> Self {
        Self {
            id: id.into(),
            ecu_type,
            status: EcuStatus::Online,
            temperature: ecu_type.nominal_temperature(),
            voltage: 14.0,
            security_level: 1,
            error_codes: Vec::new(),
            last_response_at: None,
        }
    }
}
