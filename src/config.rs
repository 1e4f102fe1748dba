//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working bridge for the stock transmitter on `/dev/rfcomm0`.

use crate::framing::FramingMode;
use crate::mapping::{ControlEntry, ControlMapping, MappingError};
use crate::protocol::Endianness;
use crate::router::{ButtonPolicy, RouterSettings};
use crate::scaling::AxisScaling;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid control mapping: {0}")]
    Mapping(#[from] MappingError),

    #[error("axes.neutral {neutral} is outside 0..={max} for {scaling:?}")]
    Neutral {
        neutral: u16,
        max: u16,
        scaling: AxisScaling,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout; only bounds how quickly a shutdown request is noticed.
    pub poll_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/rfcomm0".to_string(),
            baud_rate: 9600,
            poll_timeout_ms: 100,
        }
    }
}

impl SerialSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingSettings {
    pub mode: FramingMode,
    pub endianness: Endianness,
    /// Upper bound on bytes taken from the port per read.
    pub read_chunk: usize,
}

impl Default for FramingSettings {
    fn default() -> Self {
        Self {
            mode: FramingMode::Resync,
            endianness: Endianness::Big,
            read_chunk: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonSettings {
    pub policy: ButtonPolicy,
    pub release_after_ms: u64,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            policy: ButtonPolicy::Debounce,
            release_after_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisSettings {
    pub scaling: AxisScaling,
    pub recenter_before_set: bool,
    pub neutral: u16,
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self {
            scaling: AxisScaling::Range255,
            recenter_before_set: false,
            neutral: 16384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the virtual gamepad as shown by `evtest`
    pub device_name: String,
    pub serial: SerialSettings,
    pub framing: FramingSettings,
    pub buttons: ButtonSettings,
    pub axes: AxisSettings,
    pub controls: Vec<ControlEntry>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_name: "Serial Gamepad Bridge".to_string(),
            serial: SerialSettings::default(),
            framing: FramingSettings::default(),
            buttons: ButtonSettings::default(),
            axes: AxisSettings::default(),
            controls: ControlMapping::default_table().to_entries(),
        }
    }
}

impl BridgeConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("serial-gamepad-bridge")
            .join("config.toml")
    }

    /// Load config from a file, or return the default if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mapping()?;
        let max = self.axes.scaling.output_max();
        if self.axes.neutral > max {
            return Err(ConfigError::Neutral {
                neutral: self.axes.neutral,
                max,
                scaling: self.axes.scaling,
            });
        }
        Ok(())
    }

    pub fn mapping(&self) -> Result<ControlMapping, MappingError> {
        ControlMapping::from_entries(&self.controls)
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            policy: self.buttons.policy,
            release_after: Duration::from_millis(self.buttons.release_after_ms),
            scaling: self.axes.scaling,
            recenter_before_set: self.axes.recenter_before_set,
            neutral: self.axes.neutral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::AxisId;

    #[test]
    fn test_default_config_serializes() {
        let toml_str = BridgeConfig::default().to_toml().unwrap();
        assert!(toml_str.contains("port = \"/dev/rfcomm0\""));
        assert!(toml_str.contains("baud_rate = 9600"));
        assert!(toml_str.contains("mode = \"resync\""));
        assert!(toml_str.contains("scaling = \"range_255\""));
        assert!(toml_str.contains("[[controls]]"));
    }

    #[test]
    fn test_roundtrip() {
        let config = BridgeConfig::default();
        let parsed = BridgeConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.mapping().unwrap(), ControlMapping::default_table());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(BridgeConfig::from_toml("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = BridgeConfig::from_toml(
            r#"
[serial]
port = "/dev/ttyUSB0"

[framing]
mode = "fixed_window"
endianness = "little"

[buttons]
policy = "exclusive_group"

[axes]
scaling = "range_1000"
neutral = 32768
recenter_before_set = true

[[controls]]
kind = "axis"
id = 3
axis = "rx"
"#,
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.framing.mode, FramingMode::FixedWindow);
        assert_eq!(config.framing.endianness, Endianness::Little);

        let settings = config.router_settings();
        assert_eq!(settings.policy, ButtonPolicy::ExclusiveGroup);
        assert_eq!(settings.release_after, Duration::from_millis(100));
        assert_eq!(settings.scaling, AxisScaling::Range1000);
        assert!(settings.recenter_before_set);

        let mapping = config.mapping().unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.axes().collect::<Vec<_>>(), vec![AxisId::RX]);
    }

    #[test]
    fn test_rejects_duplicate_control_ids() {
        let err = BridgeConfig::from_toml(
            r#"
[[controls]]
kind = "button"
id = 0
index = 0

[[controls]]
kind = "button"
id = 0
index = 1
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Mapping(MappingError::DuplicateControl(0))
        ));
    }

    #[test]
    fn test_rejects_neutral_outside_range() {
        let err = BridgeConfig::from_toml("[axes]\nneutral = 40000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Neutral { max: 32767, .. }));
    }

    #[test]
    fn test_rejects_unknown_enum_value() {
        let err = BridgeConfig::from_toml("[framing]\nmode = \"sliding\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let path = std::env::temp_dir().join("serial-gamepad-bridge-missing/config.toml");
        assert_eq!(BridgeConfig::load(&path).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("serial-gamepad-bridge-{}", std::process::id()));
        let path = dir.join("config.toml");
        let mut config = BridgeConfig::default();
        config.serial.baud_rate = 115200;

        config.save(&path).unwrap();
        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
