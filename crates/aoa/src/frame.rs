//! Message framing over raw bulk transfers
//!
//! Bulk endpoints carry no message boundaries, so every application message
//! is preceded by a 2-byte big-endian length prefix sent as its own transfer,
//! followed by a transfer of exactly that many payload bytes.
//!
//! # Frame Format
//!
//! ```text
//! [Length: u16 (big-endian)][Payload: exactly `length` bytes]
//! ```
//!
//! A length of 0 carries no payload and signals orderly channel close.

use crate::error::{BridgeError, Result};

/// Size of the length prefix in bytes
pub const PREFIX_LEN: usize = 2;

/// Maximum payload length representable by the prefix (65535 bytes)
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Zero-length frame signalling orderly channel close
pub const CLOSE_SENTINEL: [u8; PREFIX_LEN] = [0, 0];

/// Encode a payload length as a big-endian prefix
pub fn encode_len(len: u16) -> [u8; PREFIX_LEN] {
    len.to_be_bytes()
}

/// Decode a big-endian length prefix
pub fn decode_len(prefix: [u8; PREFIX_LEN]) -> u16 {
    u16::from_be_bytes(prefix)
}

/// Validate an application payload length before any transfer is attempted
///
/// Zero-length payloads are rejected because length 0 is the close sentinel;
/// lengths of 65536 and above cannot be represented by the prefix.
pub fn validate_payload_len(len: usize) -> Result<u16> {
    if len == 0 || len > MAX_PAYLOAD_LEN {
        return Err(BridgeError::InvalidPayloadLength { len });
    }
    Ok(len as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_roundtrip_full_range() {
        for n in 0..=u16::MAX {
            assert_eq!(decode_len(encode_len(n)), n);
        }
    }

    #[test]
    fn test_prefix_is_big_endian() {
        assert_eq!(encode_len(0x1234), [0x12, 0x34]);
        assert_eq!(encode_len(1), [0x00, 0x01]);
        assert_eq!(decode_len([0xff, 0x00]), 0xff00);
    }

    #[test]
    fn test_close_sentinel_decodes_to_zero() {
        assert_eq!(decode_len(CLOSE_SENTINEL), 0);
    }

    #[test]
    fn test_sentinel_distinct_from_valid_payload_lengths() {
        // Every accepted payload length produces a non-sentinel prefix.
        assert!(validate_payload_len(0).is_err());
        for len in [1, 2, 255, 256, MAX_PAYLOAD_LEN] {
            let encoded = encode_len(validate_payload_len(len).unwrap());
            assert_ne!(encoded, CLOSE_SENTINEL);
        }
    }

    #[test]
    fn test_validate_payload_len_bounds() {
        assert!(matches!(
            validate_payload_len(0),
            Err(BridgeError::InvalidPayloadLength { len: 0 })
        ));
        assert_eq!(validate_payload_len(1).unwrap(), 1);
        assert_eq!(validate_payload_len(MAX_PAYLOAD_LEN).unwrap(), u16::MAX);
        assert!(matches!(
            validate_payload_len(MAX_PAYLOAD_LEN + 1),
            Err(BridgeError::InvalidPayloadLength { .. })
        ));
    }
}
