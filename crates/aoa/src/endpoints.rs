//! Endpoint resolution
//!
//! AOA accessory devices expose a single interface whose first OUT and first
//! IN endpoints carry the framed channel. Only interface 0, alternate
//! setting 0 of the active configuration is considered.

use crate::bridge::EndpointPair;
use crate::error::{BridgeError, Result};
use crate::usb::{UsbDevice, is_in_endpoint};
use tracing::debug;

/// Pick the first OUT and first IN endpoint of the active interface
pub(crate) fn resolve_endpoints<D: UsbDevice>(device: &mut D) -> Result<EndpointPair> {
    let addresses = device.endpoint_addresses()?;

    let out_addr = addresses.iter().copied().find(|a| !is_in_endpoint(*a));
    let in_addr = addresses.iter().copied().find(|a| is_in_endpoint(*a));

    match (out_addr, in_addr) {
        (Some(out_addr), Some(in_addr)) => {
            debug!(
                "Resolved endpoints: OUT {:#04x}, IN {:#04x}",
                out_addr, in_addr
            );
            Ok(EndpointPair { out_addr, in_addr })
        }
        _ => Err(BridgeError::EndpointsNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockDevice;

    #[test]
    fn test_picks_first_of_each_direction() {
        let mut device = MockDevice::with_endpoints(vec![0x01, 0x02, 0x81, 0x82]);
        let pair = resolve_endpoints(&mut device).unwrap();
        assert_eq!(pair.out_addr, 0x01);
        assert_eq!(pair.in_addr, 0x81);
    }

    #[test]
    fn test_order_in_descriptor_wins() {
        let mut device = MockDevice::with_endpoints(vec![0x81, 0x02]);
        let pair = resolve_endpoints(&mut device).unwrap();
        assert_eq!(pair.out_addr, 0x02);
        assert_eq!(pair.in_addr, 0x81);
    }

    #[test]
    fn test_missing_in_endpoint() {
        let mut device = MockDevice::with_endpoints(vec![0x01]);
        let err = resolve_endpoints(&mut device).unwrap_err();
        assert!(matches!(err, BridgeError::EndpointsNotFound));
    }

    #[test]
    fn test_missing_out_endpoint() {
        let mut device = MockDevice::with_endpoints(vec![0x81]);
        let err = resolve_endpoints(&mut device).unwrap_err();
        assert!(matches!(err, BridgeError::EndpointsNotFound));
    }

    #[test]
    fn test_no_endpoints_at_all() {
        let mut device = MockDevice::with_endpoints(Vec::new());
        assert!(resolve_endpoints(&mut device).is_err());
    }
}
