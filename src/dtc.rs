//! Module for OBD-II diagnostic trouble code data

use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// System family of a DTC, selected by the top two bits of its first byte
pub enum DtcFamily {
    /// Powertrain (engine, transmission)
    Powertrain,
    /// Chassis
    Chassis,
    /// Body
    Body,
    /// Network and vehicle integration
    Network,
}

impl DtcFamily {
    /// Letter used when printing a code of this family
    pub fn letter(&self) -> char {
        match self {
            DtcFamily::Powertrain => 'P',
            DtcFamily::Chassis => 'C',
            DtcFamily::Body => 'B',
            DtcFamily::Network => 'U',
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => DtcFamily::Powertrain,
            0b01 => DtcFamily::Chassis,
            0b10 => DtcFamily::Body,
            _ => DtcFamily::Network,
        }
    }

    fn bits(&self) -> u8 {
        match self {
            DtcFamily::Powertrain => 0b00,
            DtcFamily::Chassis => 0b01,
            DtcFamily::Body => 0b10,
            DtcFamily::Network => 0b11,
        }
    }
}

/// Diagnostic trouble code as reported by service 03.
///
/// The raw value is the two bytes sent by the ECU, so `0x0133`
/// prints as `P0133` and `0xC123` prints as `U0123`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TroubleCode {
    raw: u16,
}

impl TroubleCode {
    /// Creates a trouble code from its raw 16 bit value
    pub fn new(raw: u16) -> Self {
        Self { raw }
    }

    /// Creates a trouble code from the two bytes found on the wire
    pub fn from_bytes(b1: u8, b2: u8) -> Self {
        Self::new(u16::from_be_bytes([b1, b2]))
    }

    /// Raw 16 bit value of the code
    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// The four hex digits as they appeared in the response, EG: `"0133"`
    pub fn raw_hex(&self) -> String {
        format!("{:04X}", self.raw)
    }

    /// System family of the code
    pub fn family(&self) -> DtcFamily {
        DtcFamily::from_bits((self.raw >> 14) as u8)
    }

    /// Returns true if the code is an SAE defined (generic) code rather
    /// than a manufacturer specific one
    pub fn is_generic(&self) -> bool {
        // Second character 0 and 2 are SAE defined
        matches!((self.raw >> 12) & 0b11, 0 | 2)
    }
}

impl Display for TroubleCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [b1, b2] = self.raw.to_be_bytes();
        write!(
            f,
            "{}{}{:X}{:02X}",
            self.family().letter(),
            (b1 >> 4) & 0b11,
            b1 & 0x0F,
            b2
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid trouble code")]
/// Error produced when parsing a printed trouble code
pub struct ParseTroubleCodeError(String);

impl FromStr for TroubleCode {
    type Err = ParseTroubleCodeError;

    /// Parses the printed form, EG: `P0133`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTroubleCodeError(s.to_string());
        let mut chars = s.chars();
        let family = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('P') => DtcFamily::Powertrain,
            Some('C') => DtcFamily::Chassis,
            Some('B') => DtcFamily::Body,
            Some('U') => DtcFamily::Network,
            _ => return Err(err()),
        };
        let digits = chars.as_str();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let value = u16::from_str_radix(digits, 16).map_err(|_| err())?;
        if value > 0x3FFF {
            return Err(err());
        }
        Ok(Self::new(((family.bits() as u16) << 14) | value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_from_top_bits() {
        assert_eq!(TroubleCode::new(0x0133).to_string(), "P0133");
        assert_eq!(TroubleCode::new(0x4445).to_string(), "C0445");
        assert_eq!(TroubleCode::new(0x9234).to_string(), "B1234");
        assert_eq!(TroubleCode::new(0xC1AB).to_string(), "U01AB");
    }

    #[test]
    fn raw_hex_keeps_wire_digits() {
        let code = TroubleCode::from_bytes(0x04, 0x45);
        assert_eq!(code.raw_hex(), "0445");
        assert_eq!(code.family(), DtcFamily::Powertrain);
    }

    #[test]
    fn parse_printed_code() {
        assert_eq!("P0133".parse::<TroubleCode>(), Ok(TroubleCode::new(0x0133)));
        assert_eq!("u01ab".parse::<TroubleCode>(), Ok(TroubleCode::new(0xC1AB)));
        assert!("X0133".parse::<TroubleCode>().is_err());
        assert!("P013".parse::<TroubleCode>().is_err());
        assert!("P4000".parse::<TroubleCode>().is_err());
        assert!("P+133".parse::<TroubleCode>().is_err());
        assert!("P-133".parse::<TroubleCode>().is_err());
    }

    #[test]
    fn generic_vs_manufacturer() {
        assert!(TroubleCode::new(0x0133).is_generic());
        assert!(!TroubleCode::new(0x1133).is_generic());
    }
}
