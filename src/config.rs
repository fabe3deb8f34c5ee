//! Persisted per-device configuration.
//!
//! Mirrors what the sensor reports plus what the user edits. Stored as a
//! JSON file per device and reloaded before a capture session starts; the
//! channel count and nominal rate must be known before a measurement can
//! be created.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Channels streamed per sample tuple (1-255).
    pub channel_count: Option<u8>,
    /// Nominal sample rate reported by the firmware, in Hz.
    pub signal_hz: Option<u32>,
    /// Multiplier correcting known clock drift when deriving timestamps.
    pub rate_scaler: f64,
    pub persisted_name: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,
    pub unique_identifier: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> DeviceConfig {
        DeviceConfig {
            channel_count: None,
            signal_hz: None,
            rate_scaler: 1.0,
            persisted_name: None,
            firmware_version: None,
            hardware_version: None,
            unique_identifier: None,
        }
    }
}

impl DeviceConfig {
    pub fn load(path: &Path) -> Result<DeviceConfig> {
        let raw = fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        debug!("loaded device config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when no file exists yet.
    pub fn load_or_default(path: &Path) -> Result<DeviceConfig> {
        if path.exists() {
            DeviceConfig::load(path)
        } else {
            Ok(DeviceConfig::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        debug!("saved device config to {}", path.display());
        Ok(())
    }
}
