//! OBD2 service 09 (Request vehicle information)

use crate::obd2::{DecodeError, ObdRequest, match_response, mode, require_len};

/// Service 09 PID holding the vehicle identification number
pub const VIN_PID: u8 = 0x02;

/// Length of a VIN in characters
pub const VIN_LENGTH: usize = 17;

/// Request for the vehicle identification number
pub fn vin_request() -> ObdRequest {
    ObdRequest::new(mode::VEHICLE_INFO, VIN_PID)
}

fn vin_from_bytes(data: &[u8]) -> Result<String, DecodeError> {
    // Legacy ECUs pad the first message with NUL
    let start = data.iter().position(|b| *b != 0).unwrap_or(data.len());
    let data = &data[start..];
    if data.len() < VIN_LENGTH {
        return Err(DecodeError::TooShort {
            expected: VIN_LENGTH,
            actual: data.len(),
        });
    }
    Ok(String::from_utf8_lossy(&data[..VIN_LENGTH]).into_owned())
}

/// Decodes a VIN reply from an ISO 15765 (CAN) ECU (`49 02 01` + 17 bytes).
///
/// Multi-frame replies must be joined with [crate::obd2::merge_can_frames] first.
pub fn decode_vin(response: &str) -> Result<Option<String>, DecodeError> {
    let Some(payload) = match_response(response, &vin_request().response_prefix())? else {
        return Ok(None);
    };
    // Number of data items, always 1 for the VIN
    require_len(&payload, 1)?;
    vin_from_bytes(&payload[1..]).map(Some)
}

/// Decodes a VIN sent by a J1850, ISO 9141 or KWP ECU.
///
/// These send five lines of `49 02 <sequence> + 4 bytes`. Lines are put back in
/// sequence order before the characters are read.
pub fn decode_vin_frames<S: AsRef<str>>(lines: &[S]) -> Result<Option<String>, DecodeError> {
    let prefix = vin_request().response_prefix();
    let mut frames = Vec::new();
    for line in lines {
        if let Some(payload) = match_response(line.as_ref(), &prefix)? {
            require_len(&payload, 5)?;
            frames.push((payload[0], payload[1..5].to_vec()));
        }
    }
    if frames.is_empty() {
        return Ok(None);
    }
    frames.sort_by_key(|(seq, _)| *seq);
    let data: Vec<u8> = frames.into_iter().flat_map(|(_, d)| d).collect();
    vin_from_bytes(&data).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vin_request_encoding() {
        assert_eq!(vin_request().to_hex_string(), "0902");
        assert_eq!(vin_request().response_prefix(), "4902");
    }

    #[test]
    fn can_vin() {
        let vin = decode_vin("4902013144344750303052353542313233343536").unwrap();
        assert_eq!(vin.as_deref(), Some("1D4GP00R55B123456"));
        assert_eq!(decode_vin("41057B"), Ok(None));
        assert_eq!(
            decode_vin("490201314434"),
            Err(DecodeError::TooShort {
                expected: VIN_LENGTH,
                actual: 3
            })
        );
    }

    #[test]
    fn legacy_vin_out_of_order() {
        let lines = [
            "49 02 02 44 34 47 50",
            "49 02 01 00 00 00 31",
            "49 02 03 30 30 52 35",
            "49 02 04 35 42 31 32",
            "49 02 05 33 34 35 36",
        ];
        let vin = decode_vin_frames(&lines).unwrap();
        assert_eq!(vin.as_deref(), Some("1D4GP00R55B123456"));
    }

    #[test]
    fn legacy_vin_missing_line() {
        let lines = ["49020100000031", "49020244344750"];
        assert!(matches!(
            decode_vin_frames(&lines),
            Err(DecodeError::TooShort { expected: 17, .. })
        ));
        assert_eq!(decode_vin_frames(&["410C1AF8"]), Ok(None));
        assert!(decode_vin_frames(&["490201"]).is_err());
    }
}
