use strum_macros::{Display, EnumString};

use crate::obd2::service01::{DTC_COUNT_MASK, MIL_ON_MASK, current_data_payload};
use crate::obd2::units::{Distance, ObdUnitType, ObdValue, Pressure, Speed, Temperature, Time};
use crate::obd2::{DecodeError, ObdRequest, require_len};

/// OBD2 data PIDs used for Service 01
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, EnumString, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(missing_docs)]
pub enum DataPid {
    StatusSinceDTCCleared,
    CalculatedEngineLoad,
    EngineCoolantTemp,
    ShortTermFuelTrimBank1,
    LongTermFuelTrimBank1,
    ShortTermFuelTrimBank2,
    LongTermFuelTrimBank2,
    FuelPressureGauge,
    IntakeManifoldAbsPressure,
    EngineSpeed,
    VehicleSpeed,
    TimingAdvance,
    IntakeAirTemperature,
    MassAirFlow,
    ThrottlePosition,
    OxygenSensor1,
    OxygenSensor2,
    OxygenSensor3,
    OxygenSensor4,
    OxygenSensor5,
    OxygenSensor6,
    OxygenSensor7,
    OxygenSensor8,
    RuntimeSinceStart,
    DistanceTraveledWithMIL,
    FuelRailGaugePressure,
    CommandedEGR,
    EGRError,
    CommandedEvapPurge,
    FuelTankLevelInput,
    WarmupsSinceCodesCleared,
    DistanceTraveledSinceCodesCleared,
    AbsBarometricPressure,
    CatTempBank1Sensor1,
    CatTempBank2Sensor1,
    CatTempBank1Sensor2,
    CatTempBank2Sensor2,
    ControlModuleVoltage,
    AbsLoadValue,
    RelativeThrottlePosition,
    AmbientAirTemp,
    CommandedThrottleActuator,
    TimeRunWithMILOn,
    TimeSinceCodesCleared,
    EthanolFuelPercentage,
    EngineOilTemp,
    Unknown(u8),
}

impl From<u8> for DataPid {
    fn from(x: u8) -> Self {
        match x {
            0x01 => DataPid::StatusSinceDTCCleared,
            0x04 => DataPid::CalculatedEngineLoad,
            0x05 => DataPid::EngineCoolantTemp,
            0x06 => DataPid::ShortTermFuelTrimBank1,
            0x07 => DataPid::LongTermFuelTrimBank1,
            0x08 => DataPid::ShortTermFuelTrimBank2,
            0x09 => DataPid::LongTermFuelTrimBank2,
            0x0A => DataPid::FuelPressureGauge,
            0x0B => DataPid::IntakeManifoldAbsPressure,
            0x0C => DataPid::EngineSpeed,
            0x0D => DataPid::VehicleSpeed,
            0x0E => DataPid::TimingAdvance,
            0x0F => DataPid::IntakeAirTemperature,
            0x10 => DataPid::MassAirFlow,
            0x11 => DataPid::ThrottlePosition,
            0x14 => DataPid::OxygenSensor1,
            0x15 => DataPid::OxygenSensor2,
            0x16 => DataPid::OxygenSensor3,
            0x17 => DataPid::OxygenSensor4,
            0x18 => DataPid::OxygenSensor5,
            0x19 => DataPid::OxygenSensor6,
            0x1A => DataPid::OxygenSensor7,
            0x1B => DataPid::OxygenSensor8,
            0x1F => DataPid::RuntimeSinceStart,
            0x21 => DataPid::DistanceTraveledWithMIL,
            0x23 => DataPid::FuelRailGaugePressure,
            0x2C => DataPid::CommandedEGR,
            0x2D => DataPid::EGRError,
            0x2E => DataPid::CommandedEvapPurge,
            0x2F => DataPid::FuelTankLevelInput,
            0x30 => DataPid::WarmupsSinceCodesCleared,
            0x31 => DataPid::DistanceTraveledSinceCodesCleared,
            0x33 => DataPid::AbsBarometricPressure,
            0x3C => DataPid::CatTempBank1Sensor1,
            0x3D => DataPid::CatTempBank2Sensor1,
            0x3E => DataPid::CatTempBank1Sensor2,
            0x3F => DataPid::CatTempBank2Sensor2,
            0x42 => DataPid::ControlModuleVoltage,
            0x43 => DataPid::AbsLoadValue,
            0x45 => DataPid::RelativeThrottlePosition,
            0x46 => DataPid::AmbientAirTemp,
            0x4C => DataPid::CommandedThrottleActuator,
            0x4D => DataPid::TimeRunWithMILOn,
            0x4E => DataPid::TimeSinceCodesCleared,
            0x52 => DataPid::EthanolFuelPercentage,
            0x5C => DataPid::EngineOilTemp,
            _ => DataPid::Unknown(x),
        }
    }
}

impl From<DataPid> for u8 {
    fn from(pid: DataPid) -> Self {
        match pid {
            DataPid::StatusSinceDTCCleared => 0x01,
            DataPid::CalculatedEngineLoad => 0x04,
            DataPid::EngineCoolantTemp => 0x05,
            DataPid::ShortTermFuelTrimBank1 => 0x06,
            DataPid::LongTermFuelTrimBank1 => 0x07,
            DataPid::ShortTermFuelTrimBank2 => 0x08,
            DataPid::LongTermFuelTrimBank2 => 0x09,
            DataPid::FuelPressureGauge => 0x0A,
            DataPid::IntakeManifoldAbsPressure => 0x0B,
            DataPid::EngineSpeed => 0x0C,
            DataPid::VehicleSpeed => 0x0D,
            DataPid::TimingAdvance => 0x0E,
            DataPid::IntakeAirTemperature => 0x0F,
            DataPid::MassAirFlow => 0x10,
            DataPid::ThrottlePosition => 0x11,
            DataPid::OxygenSensor1 => 0x14,
            DataPid::OxygenSensor2 => 0x15,
            DataPid::OxygenSensor3 => 0x16,
            DataPid::OxygenSensor4 => 0x17,
            DataPid::OxygenSensor5 => 0x18,
            DataPid::OxygenSensor6 => 0x19,
            DataPid::OxygenSensor7 => 0x1A,
            DataPid::OxygenSensor8 => 0x1B,
            DataPid::RuntimeSinceStart => 0x1F,
            DataPid::DistanceTraveledWithMIL => 0x21,
            DataPid::FuelRailGaugePressure => 0x23,
            DataPid::CommandedEGR => 0x2C,
            DataPid::EGRError => 0x2D,
            DataPid::CommandedEvapPurge => 0x2E,
            DataPid::FuelTankLevelInput => 0x2F,
            DataPid::WarmupsSinceCodesCleared => 0x30,
            DataPid::DistanceTraveledSinceCodesCleared => 0x31,
            DataPid::AbsBarometricPressure => 0x33,
            DataPid::CatTempBank1Sensor1 => 0x3C,
            DataPid::CatTempBank2Sensor1 => 0x3D,
            DataPid::CatTempBank1Sensor2 => 0x3E,
            DataPid::CatTempBank2Sensor2 => 0x3F,
            DataPid::ControlModuleVoltage => 0x42,
            DataPid::AbsLoadValue => 0x43,
            DataPid::RelativeThrottlePosition => 0x45,
            DataPid::AmbientAirTemp => 0x46,
            DataPid::CommandedThrottleActuator => 0x4C,
            DataPid::TimeRunWithMILOn => 0x4D,
            DataPid::TimeSinceCodesCleared => 0x4E,
            DataPid::EthanolFuelPercentage => 0x52,
            DataPid::EngineOilTemp => 0x5C,
            DataPid::Unknown(x) => x,
        }
    }
}

impl From<DataPid> for ObdRequest {
    fn from(pid: DataPid) -> Self {
        ObdRequest::current_data(pid.into())
    }
}

impl DataPid {
    /// Number of data bytes the ECU sends after the `41 <PID>` prefix.
    /// [DataPid::Unknown] PIDs are decoded from however many bytes arrive
    pub fn data_length(&self) -> usize {
        match self {
            DataPid::EngineSpeed
            | DataPid::MassAirFlow
            | DataPid::OxygenSensor1
            | DataPid::OxygenSensor2
            | DataPid::OxygenSensor3
            | DataPid::OxygenSensor4
            | DataPid::OxygenSensor5
            | DataPid::OxygenSensor6
            | DataPid::OxygenSensor7
            | DataPid::OxygenSensor8
            | DataPid::RuntimeSinceStart
            | DataPid::DistanceTraveledWithMIL
            | DataPid::FuelRailGaugePressure
            | DataPid::DistanceTraveledSinceCodesCleared
            | DataPid::CatTempBank1Sensor1
            | DataPid::CatTempBank2Sensor1
            | DataPid::CatTempBank1Sensor2
            | DataPid::CatTempBank2Sensor2
            | DataPid::ControlModuleVoltage
            | DataPid::AbsLoadValue
            | DataPid::TimeRunWithMILOn
            | DataPid::TimeSinceCodesCleared => 2,
            DataPid::Unknown(_) => 0,
            _ => 1,
        }
    }
}

fn word(r: &[u8]) -> f32 {
    u16::from_be_bytes([r[0], r[1]]) as f32
}

fn percent(x: u8) -> ObdUnitType {
    ObdUnitType::Percent(x as f32 / 2.55)
}

fn fuel_trim(x: u8) -> ObdUnitType {
    ObdUnitType::Percent((x as f32 / 1.28) - 100.0)
}

fn temperature(celsius: f32) -> ObdUnitType {
    ObdUnitType::Temperature(Temperature::from_celsius(celsius))
}

fn oxygen_sensor(n: u8, r: &[u8]) -> Vec<ObdValue> {
    vec![
        ObdValue::new(
            format!("Oxygen sensor {n} voltage"),
            ObdUnitType::Volts(r[0] as f32 / 200.0),
        ),
        ObdValue::new(
            format!("Oxygen sensor {n} short term fuel trim"),
            fuel_trim(r[1]),
        ),
    ]
}

/// Decodes a service 01 response for `pid` into one or more named values.
///
/// Returns `Ok(None)` if the response is for a different PID, and
/// [DecodeError::TooShort] if fewer than [DataPid::data_length] bytes follow the prefix.
pub fn decode_data_pid(pid: DataPid, response: &str) -> Result<Option<Vec<ObdValue>>, DecodeError> {
    let Some(r) = current_data_payload(pid, response)? else {
        return Ok(None);
    };
    require_len(&r, pid.data_length())?;

    let single = |name: &str, value: ObdUnitType| vec![ObdValue::new(name, value)];
    let values = match pid {
        DataPid::StatusSinceDTCCleared => vec![
            ObdValue::new("MIL on", ObdUnitType::Count((r[0] & MIL_ON_MASK != 0) as u32)),
            ObdValue::new(
                "Stored trouble codes",
                ObdUnitType::Count((r[0] & DTC_COUNT_MASK) as u32),
            ),
        ],
        DataPid::CalculatedEngineLoad => single("Calculated engine load", percent(r[0])),
        DataPid::EngineCoolantTemp => single(
            "Engine coolant temperature",
            temperature(r[0] as f32 - 40.0),
        ),
        DataPid::ShortTermFuelTrimBank1 => single("Short term fuel trim - Bank 1", fuel_trim(r[0])),
        DataPid::LongTermFuelTrimBank1 => single("Long term fuel trim - Bank 1", fuel_trim(r[0])),
        DataPid::ShortTermFuelTrimBank2 => single("Short term fuel trim - Bank 2", fuel_trim(r[0])),
        DataPid::LongTermFuelTrimBank2 => single("Long term fuel trim - Bank 2", fuel_trim(r[0])),
        DataPid::FuelPressureGauge => single(
            "Fuel pressure (gauge pressure)",
            ObdUnitType::Pressure(Pressure::from_kilo_pascal(r[0] as f32 * 3.0)),
        ),
        DataPid::IntakeManifoldAbsPressure => single(
            "Intake manifold absolute pressure",
            ObdUnitType::Pressure(Pressure::from_kilo_pascal(r[0] as f32)),
        ),
        DataPid::EngineSpeed => single("Engine speed", ObdUnitType::Rpm(word(&r) / 4.0)),
        DataPid::VehicleSpeed => single(
            "Vehicle speed",
            ObdUnitType::Speed(Speed::from_kmh(r[0] as f32)),
        ),
        DataPid::TimingAdvance => single(
            "Timing advance before TDC",
            ObdUnitType::Degrees((r[0] as f32 / 2.0) - 64.0),
        ),
        DataPid::IntakeAirTemperature => {
            single("Intake air temperature", temperature(r[0] as f32 - 40.0))
        }
        DataPid::MassAirFlow => single(
            "Mass air flow sensor rate",
            ObdUnitType::FlowRate(word(&r) / 100.0),
        ),
        DataPid::ThrottlePosition => single("Throttle position", percent(r[0])),
        DataPid::OxygenSensor1 => oxygen_sensor(1, &r),
        DataPid::OxygenSensor2 => oxygen_sensor(2, &r),
        DataPid::OxygenSensor3 => oxygen_sensor(3, &r),
        DataPid::OxygenSensor4 => oxygen_sensor(4, &r),
        DataPid::OxygenSensor5 => oxygen_sensor(5, &r),
        DataPid::OxygenSensor6 => oxygen_sensor(6, &r),
        DataPid::OxygenSensor7 => oxygen_sensor(7, &r),
        DataPid::OxygenSensor8 => oxygen_sensor(8, &r),
        DataPid::RuntimeSinceStart => single(
            "Run time since engine start",
            ObdUnitType::Time(Time::from_seconds(word(&r))),
        ),
        DataPid::DistanceTraveledWithMIL => single(
            "Distance traveled with MIL on",
            ObdUnitType::Distance(Distance::from_kilometers(word(&r))),
        ),
        DataPid::FuelRailGaugePressure => single(
            "Fuel rail gauge pressure",
            ObdUnitType::Pressure(Pressure::from_kilo_pascal(word(&r) * 10.0)),
        ),
        DataPid::CommandedEGR => single("Commanded EGR", percent(r[0])),
        DataPid::EGRError => single("EGR error", fuel_trim(r[0])),
        DataPid::CommandedEvapPurge => single("Commanded evaporative purge", percent(r[0])),
        DataPid::FuelTankLevelInput => single("Fuel tank level input", percent(r[0])),
        DataPid::WarmupsSinceCodesCleared => single(
            "Warm-ups since codes cleared",
            ObdUnitType::Count(r[0] as u32),
        ),
        DataPid::DistanceTraveledSinceCodesCleared => single(
            "Distance traveled since codes cleared",
            ObdUnitType::Distance(Distance::from_kilometers(word(&r))),
        ),
        DataPid::AbsBarometricPressure => single(
            "Absolute barometric pressure",
            ObdUnitType::Pressure(Pressure::from_kilo_pascal(r[0] as f32)),
        ),
        DataPid::CatTempBank1Sensor1 => single(
            "Catalyst temperature - Bank 1, Sensor 1",
            temperature(word(&r) / 10.0 - 40.0),
        ),
        DataPid::CatTempBank2Sensor1 => single(
            "Catalyst temperature - Bank 2, Sensor 1",
            temperature(word(&r) / 10.0 - 40.0),
        ),
        DataPid::CatTempBank1Sensor2 => single(
            "Catalyst temperature - Bank 1, Sensor 2",
            temperature(word(&r) / 10.0 - 40.0),
        ),
        DataPid::CatTempBank2Sensor2 => single(
            "Catalyst temperature - Bank 2, Sensor 2",
            temperature(word(&r) / 10.0 - 40.0),
        ),
        DataPid::ControlModuleVoltage => single(
            "Control module voltage",
            ObdUnitType::Volts(word(&r) / 1000.0),
        ),
        DataPid::AbsLoadValue => single(
            "Absolute load value",
            ObdUnitType::Percent(word(&r) / 2.55),
        ),
        DataPid::RelativeThrottlePosition => single("Relative throttle position", percent(r[0])),
        DataPid::AmbientAirTemp => single("Ambient air temperature", temperature(r[0] as f32 - 40.0)),
        DataPid::CommandedThrottleActuator => {
            single("Commanded throttle actuator", percent(r[0]))
        }
        DataPid::TimeRunWithMILOn => single(
            "Time run with MIL on",
            ObdUnitType::Time(Time::from_minutes(word(&r))),
        ),
        DataPid::TimeSinceCodesCleared => single(
            "Time since trouble codes cleared",
            ObdUnitType::Time(Time::from_minutes(word(&r))),
        ),
        DataPid::EthanolFuelPercentage => single("Ethanol fuel percentage", percent(r[0])),
        DataPid::EngineOilTemp => single("Engine oil temperature", temperature(r[0] as f32 - 40.0)),
        DataPid::Unknown(x) => r
            .iter()
            .enumerate()
            .map(|(idx, b)| {
                ObdValue::new(format!("PID 0x{x:02X} byte {idx}"), ObdUnitType::Raw(*b as f32))
            })
            .collect(),
    };
    Ok(Some(values))
}
