//! Bridge construction parameters

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// USB identifiers of the peripheral in both of its identities
///
/// The device enumerates under `unconfigured_product_id` before the AOA
/// handshake and re-enumerates under `configured_product_id` afterwards.
/// Both lookups use the same `vendor_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralIdentity {
    pub vendor_id: u16,
    pub unconfigured_product_id: u16,
    pub configured_product_id: u16,
}

/// The six identification strings presented to the device during handshake
///
/// Sent in declaration order as SEND_STRING control transfers indexed 0..5.
/// The order is fixed by the AOA protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessoryDescriptor {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
    pub uri: String,
    pub serial: String,
}

impl Default for AccessoryDescriptor {
    fn default() -> Self {
        Self {
            manufacturer: "AoaBridge".to_string(),
            model: "AoaBridge".to_string(),
            description: "Length-framed message bridge".to_string(),
            version: "1".to_string(),
            uri: "https://github.com/aoa-bridge/aoa-bridge".to_string(),
            serial: "0000000000000000".to_string(),
        }
    }
}

impl AccessoryDescriptor {
    /// Fields in wire order, paired with their SEND_STRING wIndex
    pub fn fields(&self) -> [(u16, &str); 6] {
        [
            (0, self.manufacturer.as_str()),
            (1, self.model.as_str()),
            (2, self.description.as_str()),
            (3, self.version.as_str()),
            (4, self.uri.as_str()),
            (5, self.serial.as_str()),
        ]
    }
}

/// Construction parameters for [`crate::AoaBridge`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub identity: PeripheralIdentity,
    #[serde(default)]
    pub accessory: AccessoryDescriptor,
    /// Delay between reconnect polls while waiting for re-enumeration
    #[serde(default = "BridgeConfig::default_reconnect_cooldown_ms")]
    pub reconnect_cooldown_ms: u64,
    /// Number of reconnect polls before giving up
    #[serde(default = "BridgeConfig::default_reconnect_attempts")]
    pub reconnect_attempts: u32,
}

impl BridgeConfig {
    /// Create a config with default accessory strings and reconnect tuning
    pub fn new(identity: PeripheralIdentity) -> Self {
        Self {
            identity,
            accessory: AccessoryDescriptor::default(),
            reconnect_cooldown_ms: Self::default_reconnect_cooldown_ms(),
            reconnect_attempts: Self::default_reconnect_attempts(),
        }
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.reconnect_cooldown_ms)
    }

    fn default_reconnect_cooldown_ms() -> u64 {
        100
    }

    fn default_reconnect_attempts() -> u32 {
        20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> PeripheralIdentity {
        PeripheralIdentity {
            vendor_id: 0x18d1,
            unconfigured_product_id: 0x4ee2,
            configured_product_id: 0x2d01,
        }
    }

    #[test]
    fn test_default_reconnect_tuning() {
        let config = BridgeConfig::new(test_identity());
        assert_eq!(config.reconnect_cooldown(), Duration::from_millis(100));
        assert_eq!(config.reconnect_attempts, 20);
    }

    #[test]
    fn test_descriptor_field_order() {
        let descriptor = AccessoryDescriptor {
            manufacturer: "m".into(),
            model: "o".into(),
            description: "d".into(),
            version: "v".into(),
            uri: "u".into(),
            serial: "s".into(),
        };
        let fields = descriptor.fields();
        assert_eq!(fields.map(|(i, _)| i), [0, 1, 2, 3, 4, 5]);
        assert_eq!(fields.map(|(_, v)| v), ["m", "o", "d", "v", "u", "s"]);
    }
}
