//! Maps a request plus the target ECU's snapshot to a protocol
//! response, or to silence.
//!
//! One uniform draw gates the whole exchange: below the caller-supplied
//! failure probability the unit never answers. Silence is the primary
//! failure signal and is distinct from a negative response, which is a
//! completed round-trip. Given its draws the generator is pure — only
//! the snapshot's type, status and security level shape a payload.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use ecusim_model::{DiagnosticMessage, Ecu, Nrc, ServiceId};

use crate::payload;

/// Independent chance that a write is rejected at application level
/// even though the network-level gate passed.
pub const WRITE_REJECT_PROBABILITY: f64 = 0.20;

/// Simulate one request/response exchange. `None` means no response.
pub fn respond(
    request: &DiagnosticMessage,
    ecu: &Ecu,
    failure_probability: f64,
    rng: &mut ChaCha8Rng,
) -> Option<DiagnosticMessage> {
    if rng.gen::<f64>() < failure_probability {
        return None;
    }

    let response = match request.service {
        ServiceId::SessionControl => DiagnosticMessage::positive_response_to(
            request,
            Some(payload::session_timing(&request.sub_function).to_string()),
        ),

        ServiceId::ReadDataById => DiagnosticMessage::positive_response_to(
            request,
            Some(payload::read_data_payload(
                &request.sub_function,
                ecu.ecu_type,
                rng,
            )),
        ),

        ServiceId::SecurityAccess => security_access(request, ecu, rng),

        ServiceId::ClearDiagnosticInfo => DiagnosticMessage::positive_response_to(request, None),

        ServiceId::ReadDtc => DiagnosticMessage::positive_response_to(
            request,
            Some(payload::dtc_report(ecu.ecu_type, rng)),
        ),

        ServiceId::WriteDataById => {
            if rng.gen::<f64>() < WRITE_REJECT_PROBABILITY {
                DiagnosticMessage::negative_response_to(request, Nrc::RequestOutOfRange)
            } else {
                DiagnosticMessage::positive_response_to(
                    request,
                    Some(request.sub_function.clone()),
                )
            }
        }

        ServiceId::RoutineControl => DiagnosticMessage::positive_response_to(
            request,
            Some(format!("{}00", request.sub_function)),
        ),

        ServiceId::NegativeResponse | ServiceId::Unknown(_) => {
            DiagnosticMessage::negative_response_to(request, Nrc::ServiceNotSupported)
        }
    };

    Some(response)
}

/// Seed/key handshake. Odd sub-functions request a seed, even ones
/// submit a key; asking above the granted level is rejected outright.
fn security_access(
    request: &DiagnosticMessage,
    ecu: &Ecu,
    rng: &mut ChaCha8Rng,
) -> DiagnosticMessage {
    let sub = u8::from_str_radix(&request.sub_function, 16).unwrap_or(0);
    let requested_level = (u16::from(sub) + 1) / 2;

    if requested_level > u16::from(ecu.security_level) {
        return DiagnosticMessage::negative_response_to(request, Nrc::InvalidKey);
    }

    if sub % 2 == 1 {
        DiagnosticMessage::positive_response_to(request, Some(payload::security_seed(rng)))
    } else {
        DiagnosticMessage::positive_response_to(request, None)
    }
}
