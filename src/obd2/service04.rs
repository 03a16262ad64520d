//! OBD2 service 04 (Clear diagnostic trouble codes and stored values)

use crate::helpers::normalize_hex;
use crate::obd2::{ObdRequest, mode};

/// Request to clear trouble codes and switch the MIL off
pub fn clear_dtc_request() -> ObdRequest {
    ObdRequest::mode_only(mode::CLEAR_DTC)
}

/// Returns true if the response acknowledges a clear request (`44`)
pub fn decode_clear_ack(response: &str) -> bool {
    normalize_hex(response).starts_with(&clear_dtc_request().response_prefix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_ack() {
        assert!(decode_clear_ack("44"));
        assert!(decode_clear_ack(" 44 \r"));
        assert!(!decode_clear_ack("7F0422"));
        assert!(!decode_clear_ack(""));
    }
}
