//! # Config Module
//!
//! Session defaults persisted as RON. Loading never fails hard: a missing file
//! gives the defaults and a broken one is reported and replaced by defaults.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SerialAssistantError};
use crate::serial::port::PortSettings;
use crate::serial::session::ChannelConfig;

/// Default configuration file path.
pub const CONFIG_FILE: &str = "config/serial_assistant.ron";

/// Everything needed to start a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: PortSettings,
    pub receive: ChannelConfig,
    pub send: ChannelConfig,
}

impl AppConfig {
    /// Loads `path`, falling back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    /// Loads and parses `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        ron::from_str(&data).map_err(|e| {
            SerialAssistantError::config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let data = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SerialAssistantError::config(format!("failed to serialize config: {e}")))?;
        fs::write(path, data)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::encoding::{Charset, DisplayMode};
    use crate::serial::port::{ParitySetting, StopBitsSetting};

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "serial_assistant_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port.baud_rate, 9600);
        assert_eq!(config.receive.mode, DisplayMode::Hex);
        assert_eq!(config.receive.charset, Charset::Gbk);
        assert_eq!(config.send.mode, DisplayMode::Hex);
    }

    #[test]
    fn test_save_then_load() {
        let dir = scratch_dir("save_then_load");
        let path = dir.join("nested").join("config.ron");

        let mut config = AppConfig::default();
        config.port.port_name = "/dev/ttyUSB0".to_string();
        config.port.baud_rate = 115200;
        config.port.parity = ParitySetting::Even;
        config.port.stop_bits = StopBitsSetting::OnePointFive;
        config.receive = ChannelConfig::new(DisplayMode::Text, Charset::Utf8);

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = scratch_dir("partial");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.ron");
        fs::write(&path, "(receive: (mode: text, charset: utf8))").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.receive, ChannelConfig::new(DisplayMode::Text, Charset::Utf8));
        assert_eq!(config.port, PortSettings::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = scratch_dir("broken");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.ron");
        fs::write(&path, "(port: [oops").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(SerialAssistantError::Config(_))
        ));
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = scratch_dir("missing");
        assert_eq!(
            AppConfig::load_or_default(dir.join("absent.ron")),
            AppConfig::default()
        );
    }
}
