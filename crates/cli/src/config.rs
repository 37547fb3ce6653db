//! CLI configuration management

use anyhow::{Context, Result, anyhow};
use aoa::{BridgeConfig, PeripheralIdentity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "CliConfig::default_log_level")]
    pub log_level: String,
    /// Bridge construction parameters
    pub bridge: BridgeConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            // The original tool's Google/Nexus identifiers; override for
            // other hardware via config file or flags.
            bridge: BridgeConfig::new(PeripheralIdentity {
                vendor_id: 0x18d1,
                unconfigured_product_id: 0x4ee2,
                configured_product_id: 0x2d01,
            }),
        }
    }
}

impl CliConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/aoa-bridge/config.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: CliConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("No config loaded: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("aoa-bridge").join("config.toml")
        } else {
            PathBuf::from(".config/aoa-bridge/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.bridge.reconnect_attempts == 0 {
            return Err(anyhow!("reconnect_attempts must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bridge.identity.vendor_id, 0x18d1);
        assert_eq!(config.bridge.reconnect_attempts, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = CliConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: CliConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.log_level, config.log_level);
        assert_eq!(parsed.bridge, config.bridge);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: CliConfig = toml::from_str(
            r#"
            [bridge.identity]
            vendor_id = 0x2341
            unconfigured_product_id = 0x0001
            configured_product_id = 0x2d00
            "#,
        )
        .unwrap();

        assert_eq!(parsed.log_level, "info");
        assert_eq!(parsed.bridge.identity.vendor_id, 0x2341);
        assert_eq!(parsed.bridge.reconnect_cooldown_ms, 100);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = CliConfig::default();
        config.log_level = "noisy".to_string();
        assert!(config.validate().is_err());

        config.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reconnect_attempts() {
        let mut config = CliConfig::default();
        config.bridge.reconnect_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = CliConfig::default();
        config.bridge.accessory.manufacturer = "TestVendor".to_string();
        config.save(&path).unwrap();

        let loaded = CliConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.bridge.accessory.manufacturer, "TestVendor");
    }
}
