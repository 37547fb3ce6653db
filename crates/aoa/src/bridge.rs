//! The bridge itself: construction state machine plus the framed channel
//!
//! Construction runs locate → configure (if unconfigured) → reconnect wait
//! (only after a mode switch) → endpoint resolution, producing a ready
//! channel. A construction failure returns no partially-built bridge; any
//! opened handle is released by drop.

use crate::config::BridgeConfig;
use crate::detect::locate;
use crate::endpoints::resolve_endpoints;
use crate::error::{BridgeError, Result};
use crate::frame;
use crate::handshake::configure_if_needed;
use crate::reconnect::await_configured;
use crate::usb::host::RusbBackend;
use crate::usb::{UsbBackend, UsbDevice, UsbError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Bounded timeout for the close sentinel write
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Resolved bulk endpoint addresses of the accessory interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    /// Host-to-device endpoint
    pub out_addr: u8,
    /// Device-to-host endpoint
    pub in_addr: u8,
}

/// Duplex, length-framed message channel to an AOA device
///
/// The device handle and endpoint pair are exclusively owned by this
/// instance and live exactly as long as the channel is open. After
/// [`close`](AoaBridge::close) every operation fails with
/// [`BridgeError::ChannelClosed`].
pub struct AoaBridge<B: UsbBackend> {
    device: Option<B::Device>,
    endpoints: Option<EndpointPair>,
}

impl<B: UsbBackend> std::fmt::Debug for AoaBridge<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AoaBridge")
            .field("device", &self.device.as_ref().map(|_| "..."))
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl AoaBridge<RusbBackend> {
    /// Open a bridge against the real USB bus
    pub fn open(config: &BridgeConfig) -> Result<Self> {
        Self::open_with_backend(RusbBackend::new()?, config)
    }
}

impl<B: UsbBackend> AoaBridge<B> {
    /// Open a bridge through an explicit backend
    ///
    /// Finds the peripheral in either identity, switches it into accessory
    /// mode when needed (waiting out the disconnect/re-enumerate cycle), and
    /// resolves the bulk endpoint pair.
    pub fn open_with_backend(mut backend: B, config: &BridgeConfig) -> Result<Self> {
        let (device, is_configured) = locate(&mut backend, &config.identity)?;

        let mut device = match configure_if_needed(device, is_configured, &config.accessory)? {
            Some(device) => device,
            None => await_configured(
                &mut backend,
                &config.identity,
                config.reconnect_cooldown(),
                config.reconnect_attempts,
            )?,
        };

        let endpoints = resolve_endpoints(&mut device)?;
        info!(
            "Bridge ready: OUT {:#04x}, IN {:#04x}",
            endpoints.out_addr, endpoints.in_addr
        );

        Ok(Self {
            device: Some(device),
            endpoints: Some(endpoints),
        })
    }

    /// Whether the channel is still open
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn channel(&mut self) -> Result<(&mut B::Device, EndpointPair)> {
        match (self.device.as_mut(), self.endpoints) {
            (Some(device), Some(endpoints)) => Ok((device, endpoints)),
            _ => Err(BridgeError::ChannelClosed),
        }
    }

    /// Send one message as a length-prefixed frame
    ///
    /// The 2-byte prefix goes out as its own bulk transfer and is retried
    /// indefinitely on timeout: a device that just switched modes can stall
    /// briefly, and a timed-out prefix leaves no partial frame behind. The
    /// payload transfer is not retried; once the prefix is accepted the peer
    /// expects exactly `payload.len()` bytes, so any failure there leaves
    /// the framing desynchronized and the channel unusable.
    ///
    /// `timeout` bounds each individual transfer; `None` blocks indefinitely.
    pub fn write(&mut self, payload: &[u8], timeout: Option<Duration>) -> Result<()> {
        let len = frame::validate_payload_len(payload.len())?;
        let (device, endpoints) = self.channel()?;

        let prefix = frame::encode_len(len);
        loop {
            match device.write_bulk(endpoints.out_addr, &prefix, timeout) {
                Ok(n) if n == frame::PREFIX_LEN => break,
                Ok(n) => {
                    return Err(BridgeError::ChannelIo(UsbError::Other(format!(
                        "short prefix write: {} of {} bytes",
                        n,
                        frame::PREFIX_LEN
                    ))));
                }
                Err(UsbError::Timeout) => {
                    trace!("Length prefix write timed out, retrying");
                }
                Err(e) => return Err(BridgeError::ChannelIo(e)),
            }
        }

        match device.write_bulk(endpoints.out_addr, payload, timeout) {
            Ok(n) if n == payload.len() => {
                trace!("Wrote frame of {} bytes", payload.len());
                Ok(())
            }
            Ok(n) => Err(BridgeError::ChannelIo(UsbError::Other(format!(
                "short payload write: {} of {} bytes",
                n,
                payload.len()
            )))),
            Err(e) => Err(BridgeError::ChannelIo(e)),
        }
    }

    /// Receive one frame, or `None` if no message arrived within `timeout`
    ///
    /// A timeout on the length prefix just means the peer had nothing to
    /// say; callers are expected to poll. Once a prefix announces `n` bytes
    /// the peer has committed to sending them, so a timeout on the payload
    /// leg is a fatal [`BridgeError::ChannelIo`].
    ///
    /// An empty payload is the peer's close sentinel: the peer shut the
    /// channel down in an orderly fashion and will send nothing further.
    /// Application messages are always non-empty.
    pub fn read(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>> {
        let (device, endpoints) = self.channel()?;

        let mut prefix = [0u8; frame::PREFIX_LEN];
        match device.read_bulk(endpoints.in_addr, &mut prefix, timeout) {
            Ok(n) if n == frame::PREFIX_LEN => {}
            Ok(n) => {
                return Err(BridgeError::ChannelIo(UsbError::Other(format!(
                    "short prefix read: {} of {} bytes",
                    n,
                    frame::PREFIX_LEN
                ))));
            }
            Err(UsbError::Timeout) => return Ok(None),
            Err(e) => return Err(BridgeError::ChannelIo(e)),
        }

        let len = frame::decode_len(prefix) as usize;
        if len == 0 {
            debug!("Peer sent close sentinel");
            return Ok(Some(Vec::new()));
        }

        let mut payload = vec![0u8; len];
        match device.read_bulk(endpoints.in_addr, &mut payload, timeout) {
            Ok(n) if n == len => {
                trace!("Read frame of {} bytes", len);
                Ok(Some(payload))
            }
            Ok(n) => Err(BridgeError::ChannelIo(UsbError::Other(format!(
                "short payload read: {} of {} bytes",
                n, len
            )))),
            Err(e) => Err(BridgeError::ChannelIo(e)),
        }
    }

    /// Shut the channel down in an orderly fashion
    ///
    /// Signals the peer with a zero-length frame (best effort), then
    /// releases the device handle and endpoint pair. Not idempotent: a
    /// second call fails with [`BridgeError::ChannelClosed`].
    pub fn close(&mut self) -> Result<()> {
        let (device, endpoints) = self.channel()?;

        if let Err(e) = device.write_bulk(endpoints.out_addr, &frame::CLOSE_SENTINEL, Some(CLOSE_TIMEOUT))
        {
            warn!("Close sentinel write failed: {}", e);
        }

        // Dropping the handle releases the claimed interface and OS handle.
        self.device = None;
        self.endpoints = None;
        info!("Channel closed");
        Ok(())
    }
}

impl<B: UsbBackend> Drop for AoaBridge<B> {
    fn drop(&mut self) {
        if self.is_open() {
            let _ = self.close();
        }
    }
}
