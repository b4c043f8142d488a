// MIT License - Copyright (c) 2026 Peter Wright
// Checksum, ASCII-hex and numeric field helpers

use crate::error::{ConcordError, Result};

/// Sum of all bytes, modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Check that the last byte of `frame` is the checksum of everything before it.
///
/// `frame` includes the leading length byte and the trailing checksum, but
/// not the message-start character.
pub fn validate(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, body)) if !body.is_empty() => checksum(body) == *last,
        _ => false,
    }
}

/// Append the checksum of `frame` to its end.
pub fn append_checksum(frame: &mut Vec<u8>) {
    let sum = checksum(frame);
    frame.push(sum);
}

/// Overwrite the last byte of `frame` with the checksum of the preceding bytes.
pub fn update_checksum(frame: &mut [u8]) {
    if let Some((last, body)) = frame.split_last_mut() {
        *last = checksum(body);
    }
}

/// Encode bytes as uppercase ASCII hex, two characters per byte.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

/// Decode an ASCII-hex string back into bytes.
pub fn decode_hex(ascii: &str) -> Result<Vec<u8>> {
    let raw = ascii.as_bytes();
    if raw.len() % 2 != 0 {
        return Err(ConcordError::BadEncoding {
            details: format!("uneven number of characters in {:?}", ascii),
        });
    }
    raw.chunks(2).map(|pair| hex_pair(pair[0], pair[1])).collect()
}

/// Decode two ASCII hex characters into one byte.
pub fn hex_pair(high: u8, low: u8) -> Result<u8> {
    match (nibble(high), nibble(low)) {
        (Some(h), Some(l)) => Ok((h << 4) | l),
        _ => Err(ConcordError::BadEncoding {
            details: format!("invalid hex pair 0x{:02x} 0x{:02x}", high, low),
        }),
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Decode packed BCD, two decimal digits per byte.
pub fn bcd_decode(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |val, b| {
        100 * val + 10 * u32::from((b >> 4) & 0x0F) + u32::from(b & 0x0F)
    })
}

/// Big-endian 32-bit integer from the first four bytes of `data`.
///
/// Shorter input is treated as if left-padded with zeros.
pub fn bytes_to_num(data: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    let n = data.len().min(4);
    buf[4 - n..].copy_from_slice(&data[..n]);
    u32::from_be_bytes(buf)
}

/// Big-endian 4-byte representation of `num`.
pub fn num_to_bytes(num: u32) -> [u8; 4] {
    num.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[255, 1]), 0);
    }

    #[test]
    fn test_validate() {
        assert!(validate(&[2, 3, 5]));
        assert!(!validate(&[2, 3, 6]));
        assert!(!validate(&[7]));
        assert!(!validate(&[]));
    }

    #[test]
    fn test_update_and_append_checksum() {
        let mut frame = [2, 3, 0];
        update_checksum(&mut frame);
        assert_eq!(frame[2], 5);

        let mut frame = vec![0x02, 0x20];
        append_checksum(&mut frame);
        assert_eq!(frame, vec![0x02, 0x20, 0x22]);
    }

    #[test]
    fn test_encode_hex() {
        assert_eq!(encode_hex(&[10, 255]), "0AFF");
        assert_eq!(encode_hex(&[]), "");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0AFF").unwrap(), vec![10, 255]);
        assert_eq!(decode_hex("0aff").unwrap(), vec![10, 255]);
        assert!(matches!(decode_hex("0AF"), Err(ConcordError::BadEncoding { .. })));
        assert!(matches!(decode_hex("0G"), Err(ConcordError::BadEncoding { .. })));
        assert!(matches!(decode_hex("+F"), Err(ConcordError::BadEncoding { .. })));
    }

    #[test]
    fn test_hex_round_trip() {
        let frame: Vec<u8> = (0..=255).collect();
        assert_eq!(decode_hex(&encode_hex(&frame)).unwrap(), frame);
    }

    #[test]
    fn test_bcd_decode() {
        assert_eq!(bcd_decode(&[0x12]), 12);
        assert_eq!(bcd_decode(&[0x45]), 45);
        assert_eq!(bcd_decode(&[0x05, 0x20]), 520);
    }

    #[test]
    fn test_bytes_to_num() {
        assert_eq!(bytes_to_num(&[0, 0, 0, 1]), 1);
        assert_eq!(bytes_to_num(&[0, 0, 1, 0]), 256);
        assert_eq!(bytes_to_num(&[1, 0, 0, 0]), 16_777_216);
        assert_eq!(bytes_to_num(&[0x01, 0x02]), 0x0102);
    }

    #[test]
    fn test_num_to_bytes() {
        assert_eq!(num_to_bytes(1), [0, 0, 0, 1]);
        assert_eq!(num_to_bytes(256), [0, 0, 1, 0]);
        assert_eq!(num_to_bytes(16_777_216), [1, 0, 0, 0]);
    }
}
