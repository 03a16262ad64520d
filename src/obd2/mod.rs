//! Module for OBD-II request encoding and response decoding
//!
//! Every decoder in this module works on the ASCII hex text an adapter returns
//! and never touches a transport. Decoders share one return shape:
//!
//! * `Ok(Some(value))` - The response belongs to the request and was decoded
//! * `Ok(None)` - The response echoes a different mode/PID. This is a normal
//!   "not my response" outcome, not an error
//! * `Err(DecodeError)` - The response belongs to the request but is structurally broken
//!
//! Before comparing prefixes, responses are normalised: whitespace is removed and
//! letters are upper-cased, so `"41 05 7b"` and `"41057B"` decode identically.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::helpers::{decode_hex, encode_hex, normalize_hex, push_hex_byte};

mod data_pids;
mod service01;
mod service03;
mod service04;
mod service09;
mod units;

// Exports
pub use data_pids::*;
pub use service01::*;
pub use service03::*;
pub use service04::*;
pub use service09::*;
pub use units::*;

/// OBD-II service (mode) constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Stored diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// Clear trouble codes and switch the MIL off
    pub const CLEAR_DTC: u8 = 0x04;
    /// Vehicle information
    pub const VEHICLE_INFO: u8 = 0x09;
}

/// Offset added to the request mode in a positive response (`01` -> `41`)
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
/// Structural problem with a response whose prefix did match
pub enum DecodeError {
    /// Not enough payload bytes after the prefix
    #[error("Response payload too short, expected {expected} bytes but got {actual}")]
    TooShort {
        /// Bytes required after the prefix
        expected: usize,
        /// Bytes found after the prefix
        actual: usize,
    },
    /// Response has an odd number of hex digits, so cannot be split into bytes
    #[error("Response has an odd number of hex digits ({0})")]
    OddLength(usize),
    /// Response contains a character which is not a hex digit
    #[error("Invalid character '{found}' at position {position} of response")]
    InvalidHex {
        /// Character position within the normalised response
        position: usize,
        /// The offending character
        found: char,
    },
}

/// Checks if the normalised response starts with `prefix`, and decodes the
/// remaining payload into bytes.
///
/// Prefix comparison happens before any structural validation, so garbage
/// that does not carry the prefix is reported as a mismatch rather than an error.
pub(crate) fn match_response(response: &str, prefix: &str) -> Result<Option<Vec<u8>>, DecodeError> {
    let normalized = normalize_hex(response);
    match normalized.strip_prefix(prefix) {
        Some(payload) => {
            log::debug!("Response {normalized} matches prefix {prefix}");
            decode_hex(payload, prefix.len()).map(Some)
        }
        None => {
            log::warn!("Response '{normalized}' does not match expected prefix {prefix}");
            Ok(None)
        }
    }
}

/// Ensures the payload holds at least `min_length` bytes
pub(crate) fn require_len(payload: &[u8], min_length: usize) -> Result<(), DecodeError> {
    if payload.len() < min_length {
        Err(DecodeError::TooShort {
            expected: min_length,
            actual: payload.len(),
        })
    } else {
        Ok(())
    }
}

/// A single OBD-II request: a mode byte optionally followed by a PID and
/// any mode specific bytes.
///
/// The encoded form is always an even-length hex string, EG `"0105"`, `"010C"` or `"03"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObdRequest {
    mode: u8,
    data: Vec<u8>,
}

impl ObdRequest {
    /// Creates a request for `pid` in `mode`
    pub fn new(mode: u8, pid: u8) -> Self {
        Self {
            mode,
            data: vec![pid],
        }
    }

    /// Creates a request which only carries a mode byte (EG: service 03 or 04)
    pub fn mode_only(mode: u8) -> Self {
        Self {
            mode,
            data: Vec::new(),
        }
    }

    /// Creates a service 01 (current data) request
    pub fn current_data(pid: u8) -> Self {
        Self::new(mode::CURRENT_DATA, pid)
    }

    /// The request mode
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// The requested PID, if the mode uses one
    pub fn pid(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Hex text of the request, without terminator
    pub fn to_hex_string(&self) -> String {
        let mut buf = Vec::with_capacity(1 + self.data.len());
        buf.push(self.mode);
        buf.extend_from_slice(&self.data);
        encode_hex(&buf)
    }

    /// Bytes to put on the wire: ASCII hex digits followed by a carriage return
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + self.data.len() * 2);
        push_hex_byte(&mut buf, self.mode);
        for b in &self.data {
            push_hex_byte(&mut buf, *b);
        }
        buf.push(b'\r');
        buf
    }

    /// The response prefix that identifies a reply to this request.
    ///
    /// This is the mode plus 0x40, followed by the PID if there is one,
    /// EG `"0105"` -> `"4105"` and `"03"` -> `"43"`
    pub fn response_prefix(&self) -> String {
        let mut buf = Vec::with_capacity(4);
        buf.push(self.mode.wrapping_add(POSITIVE_RESPONSE_OFFSET));
        if let Some(pid) = self.pid() {
            buf.push(pid);
        }
        encode_hex(&buf)
    }
}

impl Display for ObdRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
/// Error produced when parsing a request from text
pub enum ParseRequestError {
    /// No characters given
    #[error("Request is empty")]
    Empty,
    /// Request text is not valid hex
    #[error("Request is not a valid hex string: {0}")]
    Malformed(#[from] DecodeError),
}

impl FromStr for ObdRequest {
    type Err = ParseRequestError;

    /// Parses request text such as `"0105"`, `"01 0C"` or `"03"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_hex(s);
        let bytes = decode_hex(&normalized, 0)?;
        let (mode, data) = bytes.split_first().ok_or(ParseRequestError::Empty)?;
        Ok(Self {
            mode: *mode,
            data: data.to_vec(),
        })
    }
}

/// Decodes a supported-PID bitmask response (PID `00`, `20`, `40` ...) of service 01.
///
/// Bit 7 of the first byte stands for PID `base + 1`, bit 0 of the last byte for
/// PID `base + 0x20`. Returns the list of supported PIDs in ascending order.
pub fn decode_supported_pids(response: &str, base: u8) -> Result<Option<Vec<u8>>, DecodeError> {
    let prefix = ObdRequest::current_data(base).response_prefix();
    let Some(payload) = match_response(response, &prefix)? else {
        return Ok(None);
    };
    require_len(&payload, 4)?;
    Ok(Some(
        decode_pid_response(&payload[..4])
            .into_iter()
            .enumerate()
            .filter(|(_, supported)| *supported)
            .map(|(idx, _)| base.wrapping_add(idx as u8 + 1))
            .collect(),
    ))
}

/// Joins the lines of a multi-line reply on J1850, ISO 9141 or KWP buses.
///
/// Each line repeats `prefix`, which is kept on the first matching line and removed
/// from the others. Lines for another prefix (a second ECU answering something else,
/// for instance) are skipped. Returns `None` if no line carries `prefix`.
pub fn merge_frames<S: AsRef<str>>(lines: &[S], prefix: &str) -> Option<String> {
    let mut merged: Option<String> = None;
    for line in lines {
        let line = normalize_hex(line.as_ref());
        let Some(data) = line.strip_prefix(prefix) else {
            log::debug!("Skipping reply line '{line}' without prefix {prefix}");
            continue;
        };
        if let Some(m) = merged.as_mut() {
            m.push_str(data);
        } else {
            merged = Some(line.clone());
        }
    }
    merged
}

/// Returns the data of an ISO 15765 multi-frame line (`"0: 49 02 01 31"`)
fn can_frame_data(line: &str) -> Option<&str> {
    let (label, data) = line.split_once(':')?;
    let label = label.trim();
    (label.len() == 1 && label.chars().all(|c| c.is_ascii_hexdigit())).then_some(data)
}

/// Joins an ISO 15765 multi-frame reply as the adapter prints it with CAN auto
/// formatting on: a byte count line (`"014"`) followed by frames labelled `0:` to `F:`.
///
/// A reply without frame labels is a single frame, its first line is returned.
pub fn merge_can_frames<S: AsRef<str>>(lines: &[S]) -> String {
    let frames: Vec<&str> = lines
        .iter()
        .filter_map(|l| can_frame_data(l.as_ref()))
        .collect();
    if frames.is_empty() {
        return lines
            .first()
            .map(|l| normalize_hex(l.as_ref()))
            .unwrap_or_default();
    }
    frames.into_iter().map(normalize_hex).collect()
}

/// Function to decode PID support bitmask bytes
pub(crate) fn decode_pid_response(x: &[u8]) -> Vec<bool> {
    let mut resp: Vec<bool> = Vec::new();
    for b in x {
        let mut mask: u8 = 0b10000000;
        for _ in 0..8 {
            resp.push(b & mask != 0x00);
            mask >>= 1;
        }
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_encoding() {
        let req = ObdRequest::current_data(0x0C);
        assert_eq!(req.to_hex_string(), "010C");
        assert_eq!(req.to_bytes(), b"010C\r".to_vec());
        assert_eq!(req.response_prefix(), "410C");

        let dtc = ObdRequest::mode_only(mode::READ_DTC);
        assert_eq!(dtc.to_hex_string(), "03");
        assert_eq!(dtc.response_prefix(), "43");
        assert_eq!(dtc.pid(), None);
    }

    #[test]
    fn parse_error_is_copy() {
        let err = "0G".parse::<ObdRequest>().unwrap_err();
        let reported = err;
        assert_eq!(err, reported);
        assert!(matches!(err, ParseRequestError::Malformed(_)));
    }

    #[test]
    fn request_parsing() {
        let req: ObdRequest = "01 05".parse().unwrap();
        assert_eq!(req, ObdRequest::current_data(0x05));
        assert_eq!("03".parse::<ObdRequest>().unwrap().mode(), mode::READ_DTC);
        assert_eq!("".parse::<ObdRequest>(), Err(ParseRequestError::Empty));
        assert!(matches!(
            "010".parse::<ObdRequest>(),
            Err(ParseRequestError::Malformed(DecodeError::OddLength(3)))
        ));
        assert!("01XY".parse::<ObdRequest>().is_err());
    }

    #[test]
    fn mismatch_is_not_an_error() {
        assert_eq!(match_response("410C1AF8", "4105"), Ok(None));
        assert_eq!(match_response("ZZZZ", "4105"), Ok(None));
        assert_eq!(match_response("", "4105"), Ok(None));
    }

    #[test]
    fn supported_pids_bitmask() {
        // 0xBE1FA813 is a common reply for PIDs 01-20
        let pids = decode_supported_pids("41 00 BE 1F A8 13", 0x00)
            .unwrap()
            .unwrap();
        assert_eq!(
            pids,
            vec![
                0x01, 0x03, 0x04, 0x05, 0x06, 0x07, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x13,
                0x15, 0x1C, 0x1F, 0x20
            ]
        );
        assert_eq!(decode_supported_pids("4120BE1FA813", 0x00), Ok(None));
        assert!(decode_supported_pids("4100BE1F", 0x00).is_err());
    }

    #[test]
    fn merge_legacy_lines() {
        let lines = ["43 01 33 01 44 01 55", "SEARCHING", "43 01 66 00 00 00 00"];
        assert_eq!(
            merge_frames(&lines, "43").as_deref(),
            Some("43013301440155016600000000")
        );
        assert_eq!(merge_frames(&["410C1AF8"], "43"), None);
        assert_eq!(merge_frames::<&str>(&[], "43"), None);
    }

    #[test]
    fn merge_can_lines() {
        let lines = ["014", "0: 49 02 01 31 44 34", "1: 47 50 30 30 52 35 35", "2:42313233343536"];
        assert_eq!(
            merge_can_frames(&lines),
            "4902013144344750303052353542313233343536"
        );
        // Single frame replies are not labelled
        assert_eq!(merge_can_frames(&["43 02 01 33 04 45", "43 00"]), "430201330445");
        assert_eq!(merge_can_frames::<&str>(&[]), "");
    }
}
