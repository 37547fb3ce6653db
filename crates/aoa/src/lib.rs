//! Host-side bridge to Android Open Accessory (AOA) devices
//!
//! This crate drives the AOA mode-switch handshake against a USB peripheral
//! and layers a length-framed duplex message channel over its bulk endpoints.
//! The peripheral may enumerate either as a generic (unconfigured) device or
//! already in accessory mode; [`AoaBridge::open`] handles both, including the
//! disconnect/re-enumerate cycle a mode switch triggers.
//!
//! Raw USB access goes through the [`usb::UsbBackend`] / [`usb::UsbDevice`]
//! traits. Production code uses the rusb-backed [`usb::host::RusbBackend`];
//! tests use the scripted mock in [`test_utils`].
//!
//! # Example
//!
//! ```no_run
//! use aoa::{AoaBridge, BridgeConfig, PeripheralIdentity};
//! use std::time::Duration;
//!
//! # fn main() -> aoa::Result<()> {
//! let config = BridgeConfig::new(PeripheralIdentity {
//!     vendor_id: 0x18d1,
//!     unconfigured_product_id: 0x4ee2,
//!     configured_product_id: 0x2d01,
//! });
//!
//! let mut bridge = AoaBridge::open(&config)?;
//! bridge.write(b"hello", Some(Duration::from_secs(1)))?;
//! if let Some(payload) = bridge.read(Some(Duration::from_millis(100)))? {
//!     println!("got {} bytes", payload.len());
//! }
//! bridge.close()?;
//! # Ok(())
//! # }
//! ```

mod bridge;
pub mod config;
mod detect;
mod endpoints;
pub mod error;
pub mod frame;
mod handshake;
mod reconnect;
pub mod test_utils;
pub mod usb;

pub use bridge::{AoaBridge, EndpointPair};
pub use config::{AccessoryDescriptor, BridgeConfig, PeripheralIdentity};
pub use error::{BridgeError, Result};
pub use usb::UsbError;
