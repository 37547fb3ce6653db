//! USB access traits
//!
//! The bridge consumes raw USB through these traits rather than calling rusb
//! directly, so the negotiation state machine and the framed channel can be
//! exercised against the scripted mock in [`crate::test_utils`]. The
//! production implementation lives in [`host`].

pub mod host;

use std::time::Duration;
use thiserror::Error;

/// Low-level USB transfer and access errors
///
/// Mirrors the libusb error set so backends can map their native errors
/// without loss. `Timeout` is the only variant the bridge ever treats as
/// non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    #[error("transfer timed out")]
    Timeout,
    #[error("endpoint stalled (pipe error)")]
    Pipe,
    #[error("device disconnected")]
    NoDevice,
    #[error("entity not found")]
    NotFound,
    #[error("resource busy")]
    Busy,
    #[error("buffer overflow")]
    Overflow,
    #[error("I/O error")]
    Io,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("access denied (insufficient permissions)")]
    Access,
    #[error("USB error: {0}")]
    Other(String),
}

/// Direction bit of an endpoint address (bit 7: 1 = IN, 0 = OUT)
pub const ENDPOINT_DIR_MASK: u8 = 0x80;

/// Whether an endpoint address is device-to-host
pub fn is_in_endpoint(address: u8) -> bool {
    address & ENDPOINT_DIR_MASK != 0
}

/// Device lookup by vendor/product identifiers
pub trait UsbBackend {
    type Device: UsbDevice;

    /// Find and open the device matching `vendor_id`/`product_id`
    ///
    /// Returns `Ok(None)` when no such device is attached. Supporting more
    /// than one device per id pair is out of scope; backends return the
    /// first match.
    fn open_device(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<Self::Device>, UsbError>;
}

/// An exclusively-owned handle to one USB device
///
/// Vendor control transfers address endpoint 0; bulk transfers address the
/// endpoint given per call. A `timeout` of `None` blocks indefinitely.
/// Dropping the handle releases any claimed interface and the OS resources,
/// so a failed handshake never leaks a claimed device.
pub trait UsbDevice {
    /// Vendor device-to-host control transfer; returns bytes received
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError>;

    /// Vendor host-to-device control transfer; returns bytes acknowledged
    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError>;

    /// Bulk IN transfer; returns bytes received
    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError>;

    /// Bulk OUT transfer; returns bytes acknowledged
    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize, UsbError>;

    /// Endpoint addresses of interface 0, alternate setting 0, of the
    /// active configuration, in descriptor order
    fn endpoint_addresses(&mut self) -> Result<Vec<u8>, UsbError>;

    /// Reset the device
    fn reset(&mut self) -> Result<(), UsbError>;
}
