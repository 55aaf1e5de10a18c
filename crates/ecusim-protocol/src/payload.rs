//! Payload synthesis tables for positive responses.
//!
//! Everything here is keyed lookups and bounded random draws encoded
//! as fixed-width hex. No field of the ECU beyond its type and stored
//! codes influences a payload.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use ecusim_model::EcuType;

/// Live-telemetry identifier: per-type sensor block.
pub const DID_LIVE_DATA: &str = "D100";
/// Vehicle identification number.
pub const DID_VIN: &str = "F190";
/// Active diagnostic session.
pub const DID_ACTIVE_SESSION: &str = "F186";
/// Application software version.
pub const DID_SW_VERSION: &str = "F195";

/// Session timing parameters (P2 / P2* server limits) keyed by the
/// requested session sub-function. Unknown sessions get the default
/// entry.
pub fn session_timing(sub_function: &str) -> &'static str {
    match sub_function {
        // default session: P2 = 50 ms, P2* = 5000 ms
        "01" => "00321388",
        // programming session: slower P2
        "02" => "00641388",
        // extended session: fast P2, short P2*
        "03" => "0019012C",
        _ => "00321388",
    }
}

/// Read-by-identifier payload: identifier -> per-type payload, with an
/// explicit default for identifiers the simulator has no table entry
/// for.
pub fn read_data_payload(identifier: &str, ecu_type: EcuType, rng: &mut ChaCha8Rng) -> String {
    match identifier {
        DID_LIVE_DATA => live_telemetry(ecu_type, rng),
        DID_VIN => vin(),
        DID_ACTIVE_SESSION => "01".to_string(),
        DID_SW_VERSION => sw_version(ecu_type),
        _ => "00000000".to_string(),
    }
}

/// Bounded random sensor block per ECU type, fixed-width hex.
fn live_telemetry(ecu_type: EcuType, rng: &mut ChaCha8Rng) -> String {
    match ecu_type {
        EcuType::Engine => {
            // RPM (u16), coolant temperature +40 offset (u8), load % (u8)
            let rpm: u16 = rng.gen_range(650..=6800);
            let coolant: u8 = rng.gen_range(60..=240);
            let load: u8 = rng.gen_range(0..=100);
            format!("{rpm:04X}{coolant:02X}{load:02X}")
        }
        EcuType::Transmission => {
            // gear (u8), line pressure kPa (u16), oil temperature (u8)
            let gear: u8 = rng.gen_range(0..=8);
            let pressure: u16 = rng.gen_range(200..=1800);
            let oil: u8 = rng.gen_range(50..=180);
            format!("{gear:02X}{pressure:04X}{oil:02X}")
        }
        EcuType::Abs => {
            // four wheel speeds in 0.1 km/h (u16 each)
            let mut out = String::with_capacity(16);
            for _ in 0..4 {
                let speed: u16 = rng.gen_range(0..=2500);
                out.push_str(&format!("{speed:04X}"));
            }
            out
        }
        _ => {
            // generic status word for units with no sensor block
            let word: u16 = rng.gen_range(0..=0x00FF);
            format!("{word:04X}")
        }
    }
}

fn vin() -> String {
    // Vehicle-wide value, mirrored by every unit. Encoded as ASCII hex.
    hex_ascii("WSIM0000000000001")
}

fn sw_version(ecu_type: EcuType) -> String {
    match ecu_type {
        EcuType::Engine => "0203".to_string(),
        EcuType::Transmission => "0108".to_string(),
        EcuType::Gateway => "0411".to_string(),
        _ => "0100".to_string(),
    }
}

/// Security-access seed: fresh 4-byte random value.
pub fn security_seed(rng: &mut ChaCha8Rng) -> String {
    format!("{:08X}", rng.gen::<u32>())
}

/// DTC report: two-hex count followed by each reported code's ASCII
/// bytes hex-encoded. Codes come from a closed per-type table with a
/// random prefix reported, so only the unit's type shapes the payload.
pub fn dtc_report(ecu_type: EcuType, rng: &mut ChaCha8Rng) -> String {
    let table: &[&str] = match ecu_type {
        EcuType::Engine => &["P0217", "P0300", "P0171"],
        EcuType::Transmission => &["P0730", "P0868"],
        EcuType::Body => &["B1342"],
        EcuType::Gateway => &["U0100", "U0155"],
        EcuType::Abs => &["C0035", "C0040"],
        EcuType::Airbag => &["B0001"],
    };
    let count = rng.gen_range(0..=table.len());
    let mut out = format!("{count:02X}");
    for code in &table[..count] {
        out.push_str(&hex_ascii(code));
    }
    out
}

fn hex_ascii(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02X}")).collect()
}
