// src/config.rs
//! Configuration file handling

use crate::{
    error::{GpsError, Result},
    gps::{DecodeOptions, RmcLayout},
    uart::TransportConfig,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub serial_port: Option<String>,
    pub serial_baudrate: u32,
    /// Upper bound for a blocked transmit, `None` waits forever
    pub write_timeout_ms: Option<u64>,
    pub strict: bool,
    pub rmc_layout: RmcLayout,
    pub refresh_ms: u64,
    /// Sentences written to the receiver after connecting
    pub init_commands: Vec<String>,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl GpsConfig {
    /// Get platform-specific default configuration
    pub fn platform_default() -> Self {
        #[cfg(windows)]
        let serial_port = Some("COM3".to_string());
        #[cfg(not(windows))]
        let serial_port = Some("/dev/ttyUSB0".to_string());

        Self {
            serial_port,
            serial_baudrate: 9600,
            write_timeout_ms: Some(500),
            strict: false,
            rmc_layout: RmcLayout::Standard,
            refresh_ms: 1000,
            init_commands: Vec::new(),
        }
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::platform_default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| GpsError::Other(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Other(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| {
                    GpsError::Other(format!("Failed to create config directory: {}", e))
                })?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(path, contents)
            .map_err(|e| GpsError::Other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get config file path
    pub fn get_config_path() -> Result<PathBuf> {
        #[cfg(windows)]
        let base = std::env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| GpsError::Other("APPDATA environment variable not set".to_string()))?;

        #[cfg(not(windows))]
        let base = std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".config"))
            .map_err(|_| GpsError::Other("HOME environment variable not set".to_string()))?;

        Ok(base.join("gps-stream").join("config.json"))
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.serial_port = Some(port);
        self.serial_baudrate = baudrate;
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            strict: self.strict,
            rmc_layout: self.rmc_layout,
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GpsConfig::default();
        assert_eq!(config.serial_baudrate, 9600);
        assert_eq!(config.rmc_layout, RmcLayout::Standard);
        assert!(!config.strict);
        assert_eq!(
            config.transport_config().write_timeout,
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_update_serial() {
        let mut config = GpsConfig::default();
        config.update_serial("/dev/ttyACM0".to_string(), 115200);
        assert_eq!(config.serial_port, Some("/dev/ttyACM0".to_string()));
        assert_eq!(config.serial_baudrate, 115200);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let json = r#"{ "strict": true, "rmc_layout": "compact", "write_timeout_ms": null }"#;
        let config: GpsConfig = serde_json::from_str(json).unwrap();
        assert!(config.strict);
        assert_eq!(config.rmc_layout, RmcLayout::Compact);
        assert_eq!(config.serial_baudrate, 9600);
        assert_eq!(config.transport_config().write_timeout, None);
        assert!(config.decode_options().strict);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("gps-stream-test-{}", std::process::id()))
            .join("config.json");

        let mut config = GpsConfig::default();
        config.refresh_ms = 250;
        config.init_commands.push("$PMTK220,1000*1F".to_string());
        config.save_to(&path).unwrap();

        let loaded = GpsConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("gps-stream-does-not-exist.json");
        assert_eq!(GpsConfig::load_from(&path).unwrap(), GpsConfig::default());
    }
}
