//! OBD2 service 03 (Show stored diagnostic trouble codes)

use crate::dtc::TroubleCode;
use crate::obd2::{DecodeError, ObdRequest, match_response, merge_frames, mode, require_len};

/// Request for stored trouble codes
pub fn read_dtc_request() -> ObdRequest {
    ObdRequest::mode_only(mode::READ_DTC)
}

/// Decodes a service 03 response (`43 ...`) holding `count` codes.
///
/// After the `43` prefix the response carries one 4 digit group per code, which are
/// returned in the order they were sent. Anything after the last requested group
/// (padding `0000` groups, for instance) is ignored. If the response holds fewer
/// than `count` groups, [DecodeError::TooShort] is returned rather than a shorter list.
pub fn decode_trouble_codes(
    response: &str,
    count: usize,
) -> Result<Option<Vec<TroubleCode>>, DecodeError> {
    let Some(payload) = match_response(response, &read_dtc_request().response_prefix())? else {
        return Ok(None);
    };
    codes_from_payload(&payload, count).map(Some)
}

fn codes_from_payload(payload: &[u8], count: usize) -> Result<Vec<TroubleCode>, DecodeError> {
    let Some(needed) = count.checked_mul(2) else {
        return Err(DecodeError::TooShort {
            expected: usize::MAX,
            actual: payload.len(),
        });
    };
    require_len(payload, needed)?;
    Ok(payload
        .chunks_exact(2)
        .take(count)
        .map(|pair| TroubleCode::from_bytes(pair[0], pair[1]))
        .collect())
}

/// Decodes a service 03 reply spread over several lines.
///
/// J1850, ISO 9141 and KWP ECUs send three codes per `43` line, so four or more
/// stored codes arrive as several lines. The lines are joined with [merge_frames]
/// and decoded as [decode_trouble_codes].
pub fn decode_trouble_code_frames<S: AsRef<str>>(
    lines: &[S],
    count: usize,
) -> Result<Option<Vec<TroubleCode>>, DecodeError> {
    match merge_frames(lines, &read_dtc_request().response_prefix()) {
        Some(merged) => decode_trouble_codes(&merged, count),
        None => Ok(None),
    }
}

/// Decodes a service 03 reply from an ISO 15765 (CAN) ECU.
///
/// On CAN the byte after `43` is the number of codes the ECU sends, the 4 digit
/// groups follow it. Multi-frame replies must be joined with
/// [crate::obd2::merge_can_frames] first.
pub fn decode_can_trouble_codes(
    response: &str,
    count: usize,
) -> Result<Option<Vec<TroubleCode>>, DecodeError> {
    let Some(payload) = match_response(response, &read_dtc_request().response_prefix())? else {
        return Ok(None);
    };
    require_len(&payload, 1)?;
    if payload[0] as usize != count {
        log::debug!(
            "ECU lists {} codes in its reply, {count} were requested",
            payload[0]
        );
    }
    codes_from_payload(&payload[1..], count).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(codes: &[TroubleCode]) -> Vec<String> {
        codes.iter().map(|c| c.raw_hex()).collect()
    }

    #[test]
    fn codes_in_wire_order() {
        let codes = decode_trouble_codes("4301330445", 2).unwrap().unwrap();
        assert_eq!(raw(&codes), vec!["0133", "0445"]);
        assert_eq!(codes[0].to_string(), "P0133");
        assert_eq!(codes[1].to_string(), "P0445");
    }

    #[test]
    fn groups_follow_prefix() {
        let codes = decode_trouble_codes("4301330144500000", 2).unwrap().unwrap();
        assert_eq!(raw(&codes), vec!["0133", "0144"]);
        // Decoding the same input again gives the same result
        assert_eq!(decode_trouble_codes("4301330144500000", 2).unwrap().unwrap(), codes);
    }

    #[test]
    fn padding_is_ignored() {
        let codes = decode_trouble_codes("43 01 33 00 00 00 00", 1).unwrap().unwrap();
        assert_eq!(raw(&codes), vec!["0133"]);
    }

    #[test]
    fn zero_count() {
        assert_eq!(decode_trouble_codes("43", 0), Ok(Some(Vec::new())));
    }

    #[test]
    fn short_response_is_malformed() {
        assert_eq!(
            decode_trouble_codes("43013304", 2),
            Err(DecodeError::TooShort {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(decode_trouble_codes("4301330", 2), Err(DecodeError::OddLength(7)));
    }

    #[test]
    fn huge_count_is_malformed() {
        assert!(matches!(
            decode_trouble_codes("430133", usize::MAX),
            Err(DecodeError::TooShort { actual: 2, .. })
        ));
        assert!(decode_can_trouble_codes("43010133", usize::MAX).is_err());
    }

    #[test]
    fn codes_over_several_lines() {
        let lines = ["430133014401 55", "43016600000000"];
        let codes = decode_trouble_code_frames(&lines, 4).unwrap().unwrap();
        assert_eq!(raw(&codes), vec!["0133", "0144", "0155", "0166"]);
        assert_eq!(decode_trouble_code_frames(&["41057B"], 1), Ok(None));
    }

    #[test]
    fn can_count_byte_is_skipped() {
        let codes = decode_can_trouble_codes("430201330445", 2).unwrap().unwrap();
        assert_eq!(raw(&codes), vec!["0133", "0445"]);
        assert_eq!(decode_can_trouble_codes("4300", 0), Ok(Some(Vec::new())));
        assert_eq!(
            decode_can_trouble_codes("43", 0),
            Err(DecodeError::TooShort {
                expected: 1,
                actual: 0
            })
        );
        assert_eq!(decode_can_trouble_codes("41057B", 1), Ok(None));
    }

    #[test]
    fn other_service_is_mismatch() {
        assert_eq!(decode_trouble_codes("4101830000", 1), Ok(None));
    }
}
