use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic protocol services, closed over the codes the simulator
/// speaks. Unknown wire codes land in the `Unknown` arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    SessionControl,
    ClearDiagnosticInfo,
    ReadDtc,
    ReadDataById,
    SecurityAccess,
    WriteDataById,
    RoutineControl,
    NegativeResponse,
    Unknown(u8),
}

impl ServiceId {
    pub fn from_code(code: u8) -> ServiceId {
        match code {
            0x10 => ServiceId::SessionControl,
            0x14 => ServiceId::ClearDiagnosticInfo,
            0x19 => ServiceId::ReadDtc,
            0x22 => ServiceId::ReadDataById,
            0x27 => ServiceId::SecurityAccess,
            0x2E => ServiceId::WriteDataById,
            0x31 => ServiceId::RoutineControl,
            0x7F => ServiceId::NegativeResponse,
            other => ServiceId::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ServiceId::SessionControl => 0x10,
            ServiceId::ClearDiagnosticInfo => 0x14,
            ServiceId::ReadDtc => 0x19,
            ServiceId::ReadDataById => 0x22,
            ServiceId::SecurityAccess => 0x27,
            ServiceId::WriteDataById => 0x2E,
            ServiceId::RoutineControl => 0x31,
            ServiceId::NegativeResponse => 0x7F,
            ServiceId::Unknown(code) => *code,
        }
    }

    /// Wire code of a positive acknowledgement for this service.
    pub fn positive_response_code(&self) -> u8 {
        self.code() | 0x40
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceId::SessionControl => "session_control",
            ServiceId::ClearDiagnosticInfo => "clear_diagnostic_info",
            ServiceId::ReadDtc => "read_dtc",
            ServiceId::ReadDataById => "read_data_by_id",
            ServiceId::SecurityAccess => "security_access",
            ServiceId::WriteDataById => "write_data_by_id",
            ServiceId::RoutineControl => "routine_control",
            ServiceId::NegativeResponse => "negative_response",
            ServiceId::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ServiceId {
    /// Two upper hex digits, the protocol's own spelling.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.code())
    }
}

/// Negative-response codes, closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nrc {
    GeneralReject,
    ServiceNotSupported,
    SubFunctionNotSupported,
    IncorrectLength,
    ConditionsNotCorrect,
    RequestOutOfRange,
    SecurityAccessDenied,
    InvalidKey,
    RequiredTimeDelayNotExpired,
    ResponsePending,
}

impl Nrc {
    pub fn code(&self) -> u8 {
        match self {
            Nrc::GeneralReject => 0x10,
            Nrc::ServiceNotSupported => 0x11,
            Nrc::SubFunctionNotSupported => 0x12,
            Nrc::IncorrectLength => 0x13,
            Nrc::ConditionsNotCorrect => 0x22,
            Nrc::RequestOutOfRange => 0x31,
            Nrc::SecurityAccessDenied => 0x33,
            Nrc::InvalidKey => 0x35,
            Nrc::RequiredTimeDelayNotExpired => 0x37,
            Nrc::ResponsePending => 0x78,
        }
    }

    pub fn from_code(code: u8) -> Option<Nrc> {
        match code {
            0x10 => Some(Nrc::GeneralReject),
            0x11 => Some(Nrc::ServiceNotSupported),
            0x12 => Some(Nrc::SubFunctionNotSupported),
            0x13 => Some(Nrc::IncorrectLength),
            0x22 => Some(Nrc::ConditionsNotCorrect),
            0x31 => Some(Nrc::RequestOutOfRange),
            0x33 => Some(Nrc::SecurityAccessDenied),
            0x35 => Some(Nrc::InvalidKey),
            0x37 => Some(Nrc::RequiredTimeDelayNotExpired),
            0x78 => Some(Nrc::ResponsePending),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Nrc::GeneralReject => "general reject",
            Nrc::ServiceNotSupported => "service not supported",
            Nrc::SubFunctionNotSupported => "sub-function not supported",
            Nrc::IncorrectLength => "incorrect message length",
            Nrc::ConditionsNotCorrect => "conditions not correct",
            Nrc::RequestOutOfRange => "request out of range",
            Nrc::SecurityAccessDenied => "security access denied",
            Nrc::InvalidKey => "invalid key",
            Nrc::RequiredTimeDelayNotExpired => "required time delay not expired",
            Nrc::ResponsePending => "response pending",
        }
    }
}

impl fmt::Display for Nrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.code())
    }
}

/// One diagnostic request or response on the simulated bus.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    pub id: String,
    pub service: ServiceId,
    pub sub_function: String,
    /// Payload as a hex-byte string.
    pub data: Option<String>,
    pub target_ecu: String,
}

impl DiagnosticMessage {
    pub fn request(
        id: impl Into<String>,
        service: ServiceId,
        sub_function: impl Into<String>,
        data: Option<String>,
        target_ecu: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service,
            sub_function: sub_function.into(),
            data,
            target_ecu: target_ecu.into(),
        }
    }

    /// Positive acknowledgement of `request` carrying `data`.
    pub fn positive_response_to(request: &DiagnosticMessage, data: Option<String>) -> Self {
        Self {
            id: format!("{}-resp", request.id),
            service: request.service,
            sub_function: request.sub_function.clone(),
            data,
            target_ecu: request.target_ecu.clone(),
        }
    }

    /// Negative response to `request`: service 7F, data = rejected
    /// service hex + NRC hex.
    pub fn negative_response_to(request: &DiagnosticMessage, nrc: Nrc) -> Self {
        Self {
            id: format!("{}-resp", request.id),
            service: ServiceId::NegativeResponse,
            sub_function: request.sub_function.clone(),
            data: Some(format!("{}{}", request.service, nrc)),
            target_ecu: request.target_ecu.clone(),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.service == ServiceId::NegativeResponse
    }

    /// NRC byte of a negative response, parsed back out of the payload.
    pub fn nrc(&self) -> Option<Nrc> {
        if !self.is_negative() {
            return None;
        }
        let data = self.data.as_deref()?;
        let byte = u8::from_str_radix(data.get(2..4)?, 16).ok()?;
        Nrc::from_code(byte)
    }
}

/// An ordered list of diagnostic requests executed as one logical test.
/// Immutable input to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSequence {
    pub id: String,
    pub name: String,
    pub messages: Vec<DiagnosticMessage>,
    pub timeout_ms: u64,
}

impl TestSequence {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        messages: Vec<DiagnosticMessage>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            messages,
            timeout_ms,
        }
    }
}
