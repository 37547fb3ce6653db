//! Device locator
//!
//! Looks the peripheral up under both of its identities and enforces that
//! exactly one is present. The two identities are mutually exclusive by
//! construction (one physical device cannot enumerate twice), so finding
//! both means a second device is attached.

use crate::config::PeripheralIdentity;
use crate::error::{BridgeError, Result};
use crate::usb::{UsbBackend, UsbError};
use tracing::debug;

/// Outcome of one lookup pass over both identities
pub(crate) enum Detection<D> {
    /// Neither identity is present
    Absent,
    /// Both identities are present at once
    Ambiguous,
    /// Found under the unconfigured product id
    Unconfigured(D),
    /// Found in accessory mode
    Configured(D),
}

/// Look the device up under both product ids
pub(crate) fn detect<B: UsbBackend>(
    backend: &mut B,
    identity: &PeripheralIdentity,
) -> std::result::Result<Detection<B::Device>, UsbError> {
    let unconfigured =
        backend.open_device(identity.vendor_id, identity.unconfigured_product_id)?;
    let configured = backend.open_device(identity.vendor_id, identity.configured_product_id)?;

    Ok(match (unconfigured, configured) {
        (None, None) => Detection::Absent,
        (Some(_), Some(_)) => Detection::Ambiguous,
        (Some(device), None) => Detection::Unconfigured(device),
        (None, Some(device)) => Detection::Configured(device),
    })
}

/// Locate the peripheral, failing unless exactly one identity is present
///
/// Returns the opened handle and whether it was found in accessory mode.
pub(crate) fn locate<B: UsbBackend>(
    backend: &mut B,
    identity: &PeripheralIdentity,
) -> Result<(B::Device, bool)> {
    match detect(backend, identity)? {
        Detection::Unconfigured(device) => {
            debug!(
                "Found unconfigured device {:04x}:{:04x}",
                identity.vendor_id, identity.unconfigured_product_id
            );
            Ok((device, false))
        }
        Detection::Configured(device) => {
            debug!(
                "Found accessory-mode device {:04x}:{:04x}",
                identity.vendor_id, identity.configured_product_id
            );
            Ok((device, true))
        }
        Detection::Absent => Err(BridgeError::AmbiguousOrAbsentDevice { found: 0 }),
        Detection::Ambiguous => Err(BridgeError::AmbiguousOrAbsentDevice { found: 2 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockBackend, MockDevice, test_identity};

    #[test]
    fn test_locate_unconfigured() {
        let mut backend = MockBackend::new();
        backend.push_lookup(Some(MockDevice::default()));
        backend.push_lookup(None);

        let (_, is_configured) = locate(&mut backend, &test_identity()).unwrap();
        assert!(!is_configured);
    }

    #[test]
    fn test_locate_configured() {
        let mut backend = MockBackend::new();
        backend.push_lookup(None);
        backend.push_lookup(Some(MockDevice::default()));

        let (_, is_configured) = locate(&mut backend, &test_identity()).unwrap();
        assert!(is_configured);
    }

    #[test]
    fn test_locate_absent() {
        let mut backend = MockBackend::new();
        let err = locate(&mut backend, &test_identity()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::AmbiguousOrAbsentDevice { found: 0 }
        ));
    }

    #[test]
    fn test_locate_ambiguous() {
        let mut backend = MockBackend::new();
        backend.push_lookup(Some(MockDevice::default()));
        backend.push_lookup(Some(MockDevice::default()));

        let err = locate(&mut backend, &test_identity()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::AmbiguousOrAbsentDevice { found: 2 }
        ));
    }
}
