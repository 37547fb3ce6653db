//! Bridge error types

use crate::usb::UsbError;
use thiserror::Error;

/// Errors produced by bridge construction and channel operation
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Device lookup found zero or two matching identities, expected exactly one
    #[error("device lookup found {found} matching devices, expected exactly one")]
    AmbiguousOrAbsentDevice { found: usize },

    /// Device speaks an AOA protocol version other than 2
    #[error("device reports AOA protocol version {version}, only version 2 is supported")]
    UnsupportedProtocolVersion { version: u16 },

    /// A handshake control transfer acknowledged the wrong byte count
    #[error(
        "accessory handshake rejected at {stage}: device acknowledged {acknowledged} bytes, expected {expected}"
    )]
    HandshakeRejected {
        stage: &'static str,
        expected: usize,
        acknowledged: usize,
    },

    /// Device never re-enumerated in accessory mode
    #[error("device did not re-enumerate in accessory mode after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// Active interface does not expose both an OUT and an IN endpoint
    #[error("active interface does not expose both an OUT and an IN endpoint")]
    EndpointsNotFound,

    /// Operation attempted after close
    #[error("channel is closed")]
    ChannelClosed,

    /// Payload length outside the framable range
    #[error("payload length {len} outside supported range 1..=65535")]
    InvalidPayloadLength { len: usize },

    /// Fatal channel I/O failure; framing state may be desynchronized from
    /// the peer and the channel should not be reused
    #[error("channel I/O error: {0}")]
    ChannelIo(UsbError),

    /// USB access failure outside channel operation (lookup, handshake)
    #[error("USB access error: {0}")]
    Usb(#[from] UsbError),
}

/// Type alias for bridge results
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::HandshakeRejected {
            stage: "send manufacturer string",
            expected: 12,
            acknowledged: 0,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("send manufacturer string"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_usb_error_conversion() {
        let err: BridgeError = UsbError::Access.into();
        assert!(matches!(err, BridgeError::Usb(UsbError::Access)));
    }
}
