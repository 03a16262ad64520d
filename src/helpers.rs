//! When parsing adapter replies from raw ASCII hex,
//! some functions in here can be useful with data transformation

use crate::obd2::DecodeError;

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Converts a single ASCII hex digit into its nibble value
pub(crate) fn hex_to_nibble(hex: u8) -> Option<u8> {
    match hex {
        b'0'..=b'9' => Some(hex - b'0'),
        b'a'..=b'f' => Some(hex - b'a' + 10),
        b'A'..=b'F' => Some(hex - b'A' + 10),
        _ => None,
    }
}

/// Appends the two upper case hex digits of `byte` to `buf`
pub(crate) fn push_hex_byte(buf: &mut Vec<u8>, byte: u8) {
    buf.push(HEX[byte as usize >> 4]);
    buf.push(HEX[byte as usize & 0xF]);
}

/// Strips ASCII whitespace and upper-cases the remaining characters.
///
/// ELM327 adapters insert spaces between bytes unless `ATS0` is active,
/// and some clones reply in lower case.
pub fn normalize_hex(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Decodes an ASCII hex string (no separators) into bytes.
///
/// `offset` is only used for error reporting, it is the character position
/// of `input[0]` within the full response.
pub fn decode_hex(input: &str, offset: usize) -> Result<Vec<u8>, DecodeError> {
    let raw = input.as_bytes();
    if raw.len() % 2 != 0 {
        return Err(DecodeError::OddLength(offset + raw.len()));
    }
    raw.chunks_exact(2)
        .enumerate()
        .map(|(idx, pair)| {
            let pos = offset + idx * 2;
            let hi = hex_to_nibble(pair[0]).ok_or(DecodeError::InvalidHex {
                position: pos,
                found: pair[0] as char,
            })?;
            let lo = hex_to_nibble(pair[1]).ok_or(DecodeError::InvalidHex {
                position: pos + 1,
                found: pair[1] as char,
            })?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

/// Encodes bytes as an upper case ASCII hex string
pub fn encode_hex(input: &[u8]) -> String {
    let mut buf = Vec::with_capacity(input.len() * 2);
    for b in input {
        push_hex_byte(&mut buf, *b);
    }
    // Only ever contains bytes from HEX
    String::from_utf8_lossy(&buf).into_owned()
}
