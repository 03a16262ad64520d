//! OBD2 service 01 (Show current data)
//!
//! Decoders for the PIDs the client reads most often. Each one checks the
//! echoed `41 <PID>` prefix first, see [crate::obd2] for the shared return shape.

use bitflags::bitflags;

use crate::obd2::units::Temperature;
use crate::obd2::{DataPid, DecodeError, ObdRequest, match_response, require_len};

/// MIL flag of byte A in the PID 01 response
pub(crate) const MIL_ON_MASK: u8 = 0x80;
/// Stored DTC count of byte A in the PID 01 response
pub(crate) const DTC_COUNT_MASK: u8 = 0x7F;

/// Decodes the payload of a service 01 reply for `pid`
pub(crate) fn current_data_payload(
    pid: DataPid,
    response: &str,
) -> Result<Option<Vec<u8>>, DecodeError> {
    match_response(response, &ObdRequest::from(pid).response_prefix())
}

/// Decodes an engine coolant temperature response (`41 05 A`).
///
/// The value is `A - 40` in degrees Celsius. Use [Temperature::to_fahrenheit]
/// if Fahrenheit is wanted.
pub fn decode_coolant_temperature(response: &str) -> Result<Option<Temperature>, DecodeError> {
    let Some(payload) = current_data_payload(DataPid::EngineCoolantTemp, response)? else {
        return Ok(None);
    };
    require_len(&payload, 1)?;
    Ok(Some(Temperature::from_celsius(payload[0] as f32 - 40.0)))
}

/// Decodes an engine speed response (`41 0C A B`).
///
/// The ECU sends quarter RPM steps, so the value is `(256A + B) / 4`
pub fn decode_rpm(response: &str) -> Result<Option<f32>, DecodeError> {
    let Some(payload) = current_data_payload(DataPid::EngineSpeed, response)? else {
        return Ok(None);
    };
    require_len(&payload, 2)?;
    Ok(Some(u16::from_be_bytes([payload[0], payload[1]]) as f32 / 4.0))
}

/// Decodes the number of stored trouble codes from a monitor status
/// response (`41 01 A ...`).
///
/// The high bit of `A` is the MIL flag. With the lamp on this is `A - 128`,
/// with the lamp off the low 7 bits are returned as is.
pub fn decode_trouble_code_count(response: &str) -> Result<Option<u8>, DecodeError> {
    Ok(decode_monitor_status(response)?.map(|status| status.dtc_count))
}

bitflags! {
    /// Continuous monitors reported in byte B of the PID 01 response
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ContinuousMonitors: u8 {
        /// Misfire monitoring
        const MISFIRE = 0b0000_0001;
        /// Fuel system monitoring
        const FUEL_SYSTEM = 0b0000_0010;
        /// Comprehensive component monitoring
        const COMPONENTS = 0b0000_0100;
    }
}

/// Decoded monitor status since DTCs were cleared (service 01 PID 01)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorStatus {
    /// Malfunction indicator lamp (Check engine light) is on
    pub mil_on: bool,
    /// Number of stored emission related DTCs
    pub dtc_count: u8,
    /// Monitors the ECU supports. Empty if the ECU only sent byte A
    pub available: ContinuousMonitors,
    /// Supported monitors which have not completed yet
    pub incomplete: ContinuousMonitors,
    /// Engine is compression ignition (Diesel)
    pub compression_ignition: bool,
}

/// Decodes a monitor status response (`41 01 A [B C D]`).
///
/// Only byte A is required. Byte B is decoded when present
pub fn decode_monitor_status(response: &str) -> Result<Option<MonitorStatus>, DecodeError> {
    let Some(payload) = current_data_payload(DataPid::StatusSinceDTCCleared, response)? else {
        return Ok(None);
    };
    require_len(&payload, 1)?;
    let a = payload[0];
    let b = payload.get(1).copied().unwrap_or(0);
    Ok(Some(MonitorStatus {
        mil_on: a & MIL_ON_MASK != 0,
        dtc_count: a & DTC_COUNT_MASK,
        available: ContinuousMonitors::from_bits_truncate(b),
        incomplete: ContinuousMonitors::from_bits_truncate(b >> 4),
        compression_ignition: b & 0b0000_1000 != 0,
    }))
}
