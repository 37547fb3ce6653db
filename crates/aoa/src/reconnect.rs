//! Reconnect waiter
//!
//! After the mode switch the device drops off the bus and re-enumerates
//! under its accessory product id. This polls the locator until the
//! configured identity appears, bounded by an attempt budget. Transient
//! lookup failures (device mid-re-enumeration, or the old identity still
//! lingering) are expected and retried; only exhaustion is fatal.

use crate::config::PeripheralIdentity;
use crate::detect::{Detection, detect};
use crate::error::{BridgeError, Result};
use crate::usb::UsbBackend;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Poll until the device reappears in accessory mode
pub(crate) fn await_configured<B: UsbBackend>(
    backend: &mut B,
    identity: &PeripheralIdentity,
    cooldown: Duration,
    max_attempts: u32,
) -> Result<B::Device> {
    for attempt in 1..=max_attempts {
        thread::sleep(cooldown);

        match detect(backend, identity) {
            Ok(Detection::Configured(device)) => {
                debug!("Device re-enumerated in accessory mode (attempt {})", attempt);
                return Ok(device);
            }
            Ok(Detection::Absent) => {
                debug!("Device not back yet (attempt {}/{})", attempt, max_attempts);
            }
            Ok(Detection::Unconfigured(_)) | Ok(Detection::Ambiguous) => {
                // Old identity still visible while the bus settles.
                debug!(
                    "Device not yet in accessory mode (attempt {}/{})",
                    attempt, max_attempts
                );
            }
            Err(e) => {
                debug!("Lookup failed during re-enumeration: {} (attempt {})", e, attempt);
            }
        }
    }

    Err(BridgeError::ReconnectExhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockBackend, MockDevice, test_identity};
    use std::time::Instant;

    #[test]
    fn test_exhausts_after_exact_attempt_count() {
        let mut backend = MockBackend::new();
        // Empty lookup queue: every poll sees an absent device.

        let cooldown = Duration::from_millis(10);
        let start = Instant::now();
        let err = await_configured(&mut backend, &test_identity(), cooldown, 3).unwrap_err();

        assert!(matches!(err, BridgeError::ReconnectExhausted { attempts: 3 }));
        // 3 locator passes, 2 lookups each
        assert_eq!(backend.lookup_count(), 6);
        assert!(start.elapsed() >= cooldown * 3);
    }

    #[test]
    fn test_returns_on_first_configured_poll() {
        let mut backend = MockBackend::new();
        // First poll: still absent. Second poll: configured identity is back.
        backend.push_lookup(None);
        backend.push_lookup(None);
        backend.push_lookup(None);
        backend.push_lookup(Some(MockDevice::default()));

        let device =
            await_configured(&mut backend, &test_identity(), Duration::ZERO, 20).unwrap();
        drop(device);
        assert_eq!(backend.lookup_count(), 4);
    }

    #[test]
    fn test_lingering_unconfigured_identity_is_retried() {
        let mut backend = MockBackend::new();
        // Old identity still on the bus, then gone, then configured.
        backend.push_lookup(Some(MockDevice::default()));
        backend.push_lookup(None);
        backend.push_lookup(None);
        backend.push_lookup(Some(MockDevice::default()));

        let result = await_configured(&mut backend, &test_identity(), Duration::ZERO, 5);
        assert!(result.is_ok());
    }
}
