//! rusb-backed USB access
//!
//! Production implementation of the [`UsbBackend`]/[`UsbDevice`] traits on
//! top of libusb via rusb. Kernel drivers are auto-detached where the OS
//! supports it, and interface 0 is claimed on open so bulk transfers work
//! once the device is in accessory mode.

use super::{UsbBackend, UsbDevice, UsbError};
use rusb::{Context, Device, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// AOA accessory devices expose a single interface
const ACCESSORY_INTERFACE: u8 = 0;

/// Backend over a libusb context
pub struct RusbBackend {
    context: Context,
}

impl RusbBackend {
    pub fn new() -> Result<Self, UsbError> {
        let context = Context::new().map_err(map_rusb_error)?;
        Ok(Self { context })
    }
}

impl UsbBackend for RusbBackend {
    type Device = RusbDevice;

    fn open_device(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<RusbDevice>, UsbError> {
        let devices = self.context.devices().map_err(map_rusb_error)?;

        for device in devices.iter() {
            // Devices that refuse to report a descriptor are skipped rather
            // than failing the whole lookup.
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(e) => {
                    debug!(
                        "Skipping device on bus {}: no descriptor ({})",
                        device.bus_number(),
                        e
                    );
                    continue;
                }
            };

            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                debug!(
                    "Opening device {:04x}:{:04x} on bus {} address {}",
                    vendor_id,
                    product_id,
                    device.bus_number(),
                    device.address()
                );
                return RusbDevice::open(device).map(Some);
            }
        }

        Ok(None)
    }
}

/// An opened rusb device with interface 0 claimed where possible
pub struct RusbDevice {
    device: Device<Context>,
    handle: DeviceHandle<Context>,
    claimed_interface: Option<u8>,
}

impl RusbDevice {
    fn open(device: Device<Context>) -> Result<Self, UsbError> {
        let mut handle = device.open().map_err(|e| {
            warn!("Failed to open device: {}", e);
            map_rusb_error(e)
        })?;

        // Not supported on all platforms; claiming below still works where
        // no kernel driver is bound.
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Auto-detach of kernel drivers unavailable: {}", e);
        }

        // Control transfers go to endpoint 0 and need no claim, so an
        // unconfigured device that is still bound elsewhere can be handshaken
        // even when the claim fails.
        let claimed_interface = match handle.claim_interface(ACCESSORY_INTERFACE) {
            Ok(()) => Some(ACCESSORY_INTERFACE),
            Err(e) => {
                warn!("Failed to claim interface {}: {}", ACCESSORY_INTERFACE, e);
                None
            }
        };

        Ok(Self {
            device,
            handle,
            claimed_interface,
        })
    }
}

impl UsbDevice for RusbDevice {
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.handle
            .read_control(
                rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device),
                request,
                value,
                index,
                buf,
                to_rusb_timeout(timeout),
            )
            .map_err(map_rusb_error)
    }

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.handle
            .write_control(
                rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device),
                request,
                value,
                index,
                data,
                to_rusb_timeout(timeout),
            )
            .map_err(map_rusb_error)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.handle
            .read_bulk(endpoint, buf, to_rusb_timeout(timeout))
            .map_err(map_rusb_error)
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.handle
            .write_bulk(endpoint, data, to_rusb_timeout(timeout))
            .map_err(map_rusb_error)
    }

    fn endpoint_addresses(&mut self) -> Result<Vec<u8>, UsbError> {
        let config = self
            .device
            .active_config_descriptor()
            .map_err(map_rusb_error)?;

        let interface = config.interfaces().next().ok_or(UsbError::NotFound)?;
        let descriptor = interface.descriptors().next().ok_or(UsbError::NotFound)?;

        Ok(descriptor
            .endpoint_descriptors()
            .map(|endpoint| endpoint.address())
            .collect())
    }

    fn reset(&mut self) -> Result<(), UsbError> {
        self.handle.reset().map_err(map_rusb_error)?;
        debug!("Reset device");
        Ok(())
    }
}

impl Drop for RusbDevice {
    fn drop(&mut self) {
        if let Some(interface) = self.claimed_interface.take() {
            if let Err(e) = self.handle.release_interface(interface) {
                debug!("Failed to release interface {}: {}", interface, e);
            }
        }
    }
}

/// rusb expresses "no timeout" as a zero duration
fn to_rusb_timeout(timeout: Option<Duration>) -> Duration {
    timeout.unwrap_or(Duration::ZERO)
}

/// Map rusb::Error to UsbError
pub fn map_rusb_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Pipe => UsbError::Pipe,
        rusb::Error::NoDevice => UsbError::NoDevice,
        rusb::Error::NotFound => UsbError::NotFound,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Overflow => UsbError::Overflow,
        rusb::Error::Io => UsbError::Io,
        rusb::Error::InvalidParam => UsbError::InvalidParam,
        rusb::Error::Access => UsbError::Access,
        _ => UsbError::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), UsbError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), UsbError::Pipe);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), UsbError::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::Access), UsbError::Access);
    }

    #[test]
    fn test_to_rusb_timeout() {
        assert_eq!(to_rusb_timeout(None), Duration::ZERO);
        assert_eq!(
            to_rusb_timeout(Some(Duration::from_millis(250))),
            Duration::from_millis(250)
        );
    }
}
