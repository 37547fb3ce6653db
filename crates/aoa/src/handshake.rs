//! Accessory mode handshake
//!
//! Drives the AOA vendor control sequence that switches an unconfigured
//! device into accessory mode: protocol version query, the six
//! identification strings, then the mode-switch command. Devices already in
//! accessory mode only get a reset, which brings the companion application
//! back to the foreground on the device side.

use crate::config::AccessoryDescriptor;
use crate::error::{BridgeError, Result};
use crate::usb::UsbDevice;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// AOA control request codes (endpoint 0, vendor request type)
const REQ_GET_PROTOCOL: u8 = 51;
const REQ_SEND_STRING: u8 = 52;
const REQ_START_ACCESSORY: u8 = 53;

/// The only AOA protocol version this implementation speaks
const SUPPORTED_PROTOCOL_VERSION: u16 = 2;

/// Timeout for each handshake control transfer
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Settle delay after resetting an already-configured device
const RESET_SETTLE: Duration = Duration::from_secs(1);

/// Names for the SEND_STRING stages, indexed by wIndex
const STRING_STAGES: [&str; 6] = [
    "send manufacturer string",
    "send model string",
    "send description string",
    "send version string",
    "send uri string",
    "send serial string",
];

/// Switch the device into accessory mode if it is not there already
///
/// Returns `Some(device)` when the device was already configured (after a
/// reset and settle delay), or `None` after a mode switch: the handle is
/// released because the device is about to disconnect and re-enumerate, and
/// the caller must wait for the configured identity to reappear.
pub(crate) fn configure_if_needed<D: UsbDevice>(
    mut device: D,
    is_configured: bool,
    descriptor: &AccessoryDescriptor,
) -> Result<Option<D>> {
    if is_configured {
        info!("Device already in accessory mode, resetting");
        device.reset()?;
        thread::sleep(RESET_SETTLE);
        return Ok(Some(device));
    }

    let version = read_protocol_version(&mut device)?;
    if version != SUPPORTED_PROTOCOL_VERSION {
        return Err(BridgeError::UnsupportedProtocolVersion { version });
    }
    debug!("Device speaks AOA protocol version {}", version);

    for (index, value) in descriptor.fields() {
        let data = value.as_bytes();
        let acknowledged =
            device.write_control(REQ_SEND_STRING, 0, index, data, Some(CONTROL_TIMEOUT))?;
        if acknowledged != data.len() {
            return Err(BridgeError::HandshakeRejected {
                stage: STRING_STAGES[index as usize],
                expected: data.len(),
                acknowledged,
            });
        }
        debug!("Sent identification string {} ({} bytes)", index, data.len());
    }

    let acknowledged =
        device.write_control(REQ_START_ACCESSORY, 0, 0, &[], Some(CONTROL_TIMEOUT))?;
    if acknowledged != 0 {
        return Err(BridgeError::HandshakeRejected {
            stage: "start accessory mode",
            expected: 0,
            acknowledged,
        });
    }

    info!("Accessory mode requested, device will re-enumerate");

    // The handle is stale the moment the device drops off the bus; releasing
    // it here lets the configured identity be opened fresh.
    drop(device);
    Ok(None)
}

/// Query the device's AOA protocol version (2-byte little-endian reply)
fn read_protocol_version<D: UsbDevice>(device: &mut D) -> Result<u16> {
    let mut buf = [0u8; 2];
    let received = device.read_control(REQ_GET_PROTOCOL, 0, 0, &mut buf, Some(CONTROL_TIMEOUT))?;
    if received != buf.len() {
        return Err(BridgeError::HandshakeRejected {
            stage: "get protocol version",
            expected: buf.len(),
            acknowledged: received,
        });
    }
    Ok(u16::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockDevice;

    #[test]
    fn test_unsupported_version_aborts_before_strings() {
        let device = MockDevice::reporting_version(1);
        let log = device.control_log();

        let err = configure_if_needed(device, false, &AccessoryDescriptor::default()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::UnsupportedProtocolVersion { version: 1 }
        ));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_handshake_sends_six_strings_then_start() {
        let descriptor = AccessoryDescriptor::default();
        let mut device = MockDevice::default();
        device.push_control_read(Ok(2u16.to_le_bytes().to_vec()));
        let log = device.control_log();

        let result = configure_if_needed(device, false, &descriptor).unwrap();
        assert!(result.is_none());

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 8); // version query + 6 strings + start
        assert_eq!(log[0].request, REQ_GET_PROTOCOL);
        for (i, entry) in log[1..7].iter().enumerate() {
            assert_eq!(entry.request, REQ_SEND_STRING);
            assert_eq!(entry.index, i as u16);
        }
        assert_eq!(log[1].data, descriptor.manufacturer.as_bytes());
        assert_eq!(log[6].data, descriptor.serial.as_bytes());
        assert_eq!(log[7].request, REQ_START_ACCESSORY);
        assert!(log[7].data.is_empty());
    }

    #[test]
    fn test_short_string_ack_is_rejected() {
        let mut device = MockDevice::default();
        device.push_control_read(Ok(2u16.to_le_bytes().to_vec()));
        device.push_control_write(Ok(3)); // manufacturer ack too short

        let err = configure_if_needed(device, false, &AccessoryDescriptor::default()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::HandshakeRejected {
                stage: "send manufacturer string",
                acknowledged: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_start_must_acknowledge_zero_bytes() {
        let mut device = MockDevice::default();
        device.push_control_read(Ok(2u16.to_le_bytes().to_vec()));
        for _ in 0..6 {
            device.push_control_write_ack_full();
        }
        device.push_control_write(Ok(1));

        let err = configure_if_needed(device, false, &AccessoryDescriptor::default()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::HandshakeRejected {
                stage: "start accessory mode",
                expected: 0,
                acknowledged: 1,
            }
        ));
    }

    #[test]
    fn test_configured_device_is_reset_and_kept() {
        let device = MockDevice::default();
        let resets = device.reset_counter();

        let result =
            configure_if_needed(device, true, &AccessoryDescriptor::default()).unwrap();
        assert!(result.is_some());
        assert_eq!(*resets.lock().unwrap(), 1);
    }
}
