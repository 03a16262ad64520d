//! Module for service 01 unit value type conversions

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Wrapper type for Service 01 results
pub struct ObdValue {
    /// Name of the measurement
    name: String,
    /// Value of the measurement
    value: ObdUnitType,
}

impl ObdValue {
    /// Creates a new measurement
    pub fn new<T: Into<String>>(x: T, value: ObdUnitType) -> Self {
        Self {
            name: x.into(),
            value,
        }
    }

    /// Returns the value as a formatted string
    pub fn get_value_as_string(&self, use_metric: bool) -> String {
        match use_metric {
            true => self.value.to_metric_string(),
            false => self.value.to_imperial_string(),
        }
    }

    /// Returns the data in imperial form
    pub fn get_imperial_data(&self) -> f32 {
        self.value.as_imperial()
    }

    /// Returns the data in metric form
    pub fn get_metric_data(&self) -> f32 {
        self.value.as_metric()
    }

    /// Returns the imperial representation unit
    pub fn get_imperial_unit(&self) -> Option<&'static str> {
        self.value.get_imperial_unit()
    }

    /// Returns the metric representation unit
    pub fn get_metric_unit(&self) -> Option<&'static str> {
        self.value.get_metric_unit()
    }

    /// Returns the name of the ObdValue
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Returns inner value
    pub fn get_value(&self) -> ObdUnitType {
        self.value
    }
}

impl Display for ObdValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Wrapper for OBD2 speed values
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Speed(f32); // self.0 is in km/h

impl Speed {
    /// From kilometers per hour
    pub fn from_kmh(kmh: f32) -> Self {
        Self(kmh)
    }

    /// From miles per hour
    pub fn from_mph(mph: f32) -> Self {
        Self(mph * 1.609_344)
    }

    /// Returns the speed in kilometers per hour
    pub fn to_kmh(&self) -> f32 {
        self.0
    }

    /// Returns the speed in miles per hour
    pub fn to_mph(&self) -> f32 {
        self.0 / 1.609_344
    }

    /// Returns the speed in meters per second
    pub fn to_m_s(&self) -> f32 {
        self.0 / 3.6
    }
}

/// Wrapper for OBD2 temperature values.
///
/// Decoders always produce Celsius, conversion is left to the caller.
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Temperature(f32); // self.0 is in *C

impl Temperature {
    /// From celsius
    pub fn from_celsius(c: f32) -> Self {
        Self(c)
    }

    /// From fahrenheit
    pub fn from_fahrenheit(f: f32) -> Self {
        Self((f - 32.0) * (5.0 / 9.0))
    }

    /// Returns the temperature in degrees celsius
    pub fn to_celsius(&self) -> f32 {
        self.0
    }

    /// Returns the temperature in degrees fahrenheit (`c * 9/5 + 32`)
    pub fn to_fahrenheit(&self) -> f32 {
        (self.0 * (9.0 / 5.0)) + 32.0
    }
}

/// Wrapper for OBD2 pressure values
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pressure(f32); // self.0 is in kPa (Kilopascal)

impl Pressure {
    /// From bar
    pub fn from_bar(b: f32) -> Self {
        Self(b * 100.0)
    }

    /// From kPa
    pub fn from_kilo_pascal(kpa: f32) -> Self {
        Self(kpa)
    }

    /// From PSI
    pub fn from_psi(psi: f32) -> Self {
        Self(psi * 6.894_757)
    }

    /// To bar
    pub fn to_bar(&self) -> f32 {
        self.0 * 0.01
    }

    /// To kPa
    pub fn to_kilo_pascal(&self) -> f32 {
        self.0
    }

    /// to PSI
    pub fn to_psi(&self) -> f32 {
        self.0 * 0.145_038
    }

    /// to inches of mercury
    pub fn to_inhg(&self) -> f32 {
        self.0 * 0.295_3
    }
}

/// Wrapper for OBD2 time values
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time(f32); // self.0 is in seconds

impl Time {
    /// From seconds
    pub fn from_seconds(seconds: f32) -> Self {
        Self(seconds)
    }

    /// From minutes
    pub fn from_minutes(minutes: f32) -> Self {
        Self(minutes * 60.0)
    }

    /// To seconds
    pub fn to_seconds(&self) -> f32 {
        self.0
    }

    /// To duration. Format string is HH:mm:ss
    pub fn to_elapsed_string(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            (self.0 / 3600.0).floor() as u32,
            ((self.0 / 60.0).floor() as u32) % 60,
            self.0 as u32 % 60
        )
    }
}

/// Wrapper for OBD2 distance values
#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Distance(f32); // self.0 is in meters

impl Distance {
    /// From kilometers
    pub fn from_kilometers(km: f32) -> Self {
        Self(km * 1000.0)
    }
    /// To meters
    pub fn to_meters(&self) -> f32 {
        self.0
    }

    /// to Kilometers
    pub fn to_kilometers(&self) -> f32 {
        self.0 / 1000.0
    }

    /// to miles
    pub fn to_miles(&self) -> f32 {
        self.0 / 1609.344
    }
}

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// OBD unit type wrapper
pub enum ObdUnitType {
    /// Raw number
    Raw(f32),
    /// Plain count (warm-ups, codes)
    Count(u32),
    /// Speed value
    Speed(Speed),
    /// Percentage value
    Percent(f32), // Store as -100..0..100
    /// Temperature value
    Temperature(Temperature),
    /// RPM value, quarter RPM resolution
    Rpm(f32),
    /// Volts value
    Volts(f32),
    /// Angle in degrees
    Degrees(f32),
    /// Air flow in grams per second
    FlowRate(f32),
    /// Time value
    Time(Time),
    /// Distance value
    Distance(Distance),
    /// Pressure value
    Pressure(Pressure),
}

impl ObdUnitType {
    /// Returns an output string with formatted value in metric form.
    ///
    /// Values are displayed as follows:
    /// * Raw - To 1 decimal place
    /// * RPM - As is
    /// * Speed - In km/h
    /// * Percent - As percentage with 1 decimal place
    /// * Temperature - As degrees celsius
    /// * Time - As HH:mm:ss
    /// * Distance - As kilometers
    /// * Pressure - As kPa
    pub fn to_metric_string(&self) -> String {
        match self {
            ObdUnitType::Raw(i) => format!("{i:.1}"),
            ObdUnitType::Count(i) => format!("{i}"),
            ObdUnitType::Rpm(i) => format!("{i} Rpm"),
            ObdUnitType::Speed(s) => format!("{} km/h", s.to_kmh()),
            ObdUnitType::Percent(p) => format!("{p:.1} %"),
            ObdUnitType::Temperature(t) => format!("{}°C", t.to_celsius()),
            ObdUnitType::Volts(v) => format!("{v}V"),
            ObdUnitType::Degrees(d) => format!("{d}°"),
            ObdUnitType::FlowRate(g) => format!("{g} g/s"),
            ObdUnitType::Time(t) => t.to_elapsed_string(),
            ObdUnitType::Distance(d) => format!("{} km", d.to_kilometers()),
            ObdUnitType::Pressure(p) => format!("{} kPa", p.to_kilo_pascal()),
        }
    }

    /// Returns an output string with formatted value in imperial form.
    ///
    /// Values are displayed as follows:
    /// * Raw - To 1 decimal place
    /// * RPM - As is
    /// * Speed - In miles per hour
    /// * Percent - As percentage with 1 decimal place
    /// * Temperature - As degrees fahrenheit
    /// * Time - As HH:mm:ss
    /// * Distance - As miles
    /// * Pressure - As PSI
    pub fn to_imperial_string(&self) -> String {
        match self {
            ObdUnitType::Speed(s) => format!("{} mph", s.to_mph()),
            ObdUnitType::Temperature(t) => format!("{}°F", t.to_fahrenheit()),
            ObdUnitType::Distance(d) => format!("{} miles", d.to_miles()),
            ObdUnitType::Pressure(p) => format!("{} psi", p.to_psi()),
            ObdUnitType::FlowRate(g) => format!("{} lb/min", g * 0.132_277),
            _ => self.to_metric_string(),
        }
    }

    /// Returns the string of the units for the encoded value (If present) for imperial measurement
    pub fn get_imperial_unit(&self) -> Option<&'static str> {
        match self {
            ObdUnitType::Speed(_) => Some("mph"),
            ObdUnitType::Temperature(_) => Some("°F"),
            ObdUnitType::Distance(_) => Some("miles"),
            ObdUnitType::Pressure(_) => Some("psi"),
            ObdUnitType::FlowRate(_) => Some("lb/min"),
            _ => self.get_metric_unit(),
        }
    }

    /// Returns the string of the units for the encoded value (If present) for metric measurement
    pub fn get_metric_unit(&self) -> Option<&'static str> {
        match self {
            ObdUnitType::Speed(_) => Some("km/h"),
            ObdUnitType::Percent(_) => Some("%"),
            ObdUnitType::Rpm(_) => Some("Rpm"),
            ObdUnitType::Temperature(_) => Some("°C"),
            ObdUnitType::Volts(_) => Some("V"),
            ObdUnitType::Degrees(_) => Some("°"),
            ObdUnitType::FlowRate(_) => Some("g/s"),
            ObdUnitType::Time(_) => Some("s"),
            ObdUnitType::Distance(_) => Some("km"),
            ObdUnitType::Pressure(_) => Some("kPa"),
            ObdUnitType::Raw(_) | ObdUnitType::Count(_) => None,
        }
    }

    /// Returns the raw value as a float in imperial form.
    pub fn as_imperial(&self) -> f32 {
        match self {
            ObdUnitType::Speed(x) => x.to_mph(),
            ObdUnitType::Temperature(x) => x.to_fahrenheit(),
            ObdUnitType::Distance(x) => x.to_miles(),
            ObdUnitType::Pressure(x) => x.to_psi(),
            ObdUnitType::FlowRate(x) => x * 0.132_277,
            _ => self.as_metric(),
        }
    }

    /// Returns the raw value as a float in metric form.
    pub fn as_metric(&self) -> f32 {
        match self {
            ObdUnitType::Raw(x) => *x,
            ObdUnitType::Count(x) => *x as f32,
            ObdUnitType::Speed(x) => x.to_kmh(),
            ObdUnitType::Percent(x) => *x,
            ObdUnitType::Temperature(x) => x.to_celsius(),
            ObdUnitType::Rpm(x) => *x,
            ObdUnitType::Volts(x) => *x,
            ObdUnitType::Degrees(x) => *x,
            ObdUnitType::FlowRate(x) => *x,
            ObdUnitType::Time(x) => x.to_seconds(),
            ObdUnitType::Distance(x) => x.to_kilometers(),
            ObdUnitType::Pressure(x) => x.to_kilo_pascal(),
        }
    }
}

impl Display for ObdUnitType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_metric_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_conversions() {
        let t = Temperature::from_celsius(83.0);
        assert!((t.to_fahrenheit() - 181.4).abs() < 1e-3);
        assert_eq!(Temperature::from_fahrenheit(32.0).to_celsius(), 0.0);
        assert!((Temperature::from_celsius(-40.0).to_fahrenheit() + 40.0).abs() < 1e-3);
    }

    #[test]
    fn elapsed_string() {
        assert_eq!(Time::from_seconds(3725.0).to_elapsed_string(), "01:02:05");
    }

    #[test]
    fn imperial_falls_back_to_metric() {
        let v = ObdValue::new("Engine speed", ObdUnitType::Rpm(1726.0));
        assert_eq!(v.get_imperial_data(), 1726.0);
        assert_eq!(v.get_imperial_unit(), Some("Rpm"));
        assert_eq!(v.to_string(), "Engine speed: 1726 Rpm");
    }
}
