//! 设备配置（TOML）
//!
//! ```toml
//! [mediator]
//! timeout_ms = 5000
//! queue_capacity = 32
//!
//! [[peripherals]]
//! name = "ec-1"
//! kind = "sensor"
//! expected_device_type = "EC"
//!
//! [[peripherals.variables]]
//! channel = "ec"
//! variable = "water_electrical_conductivity_ms_cm"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use sprout_event::MediatorConfig;
use sprout_peripheral::PeripheralConfig;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// 设备配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub mediator: MediatorConfig,
    #[serde(default)]
    pub peripherals: Vec<PeripheralConfig>,
}

impl DeviceConfig {
    /// 从文件加载并校验
    ///
    /// # 错误
    /// - `ConfigError::Io`: 文件无法读取
    /// - `ConfigError::Parse`: TOML 格式错误
    /// - 其余变体：校验失败（见 [`DeviceConfig::validate`]）
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// 校验中介参数、外设名称唯一性及每个外设的配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mediator.validate().map_err(ConfigError::Mediator)?;

        let mut names = HashSet::new();
        for peripheral in &self.peripherals {
            if !names.insert(peripheral.name.as_str()) {
                return Err(ConfigError::DuplicatePeripheral(peripheral.name.clone()));
            }
            peripheral.validate()?;
        }
        Ok(())
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralConfig> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn with_peripheral(mut self, peripheral: PeripheralConfig) -> Self {
        self.peripherals.push(peripheral);
        self
    }
}

impl FromStr for DeviceConfig {
    type Err = ConfigError;

    /// 解析 TOML 文本并校验
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: DeviceConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_peripheral::ConfigOption;
    use sprout_state::PeripheralKind;

    const DEVICE_TOML: &str = r#"
[mediator]
timeout_ms = 2000

[[peripherals]]
name = "ec-1"
kind = "sensor"
expected_device_type = "EC"

[[peripherals.variables]]
channel = "ec"
variable = "water_electrical_conductivity_ms_cm"

[peripherals.compensation]
variable = "water_temperature_celsius"

[[peripherals.setup]]
option = { kind = "led", enabled = false }

[[peripherals]]
name = "light-1"
kind = "actuator"
expected_device_type = "LED"
poll_interval_ms = 500

[[peripherals.variables]]
channel = "ppfd"
variable = "light_ppfd_umol_m2_s"
"#;

    #[test]
    fn test_parse_device_config() {
        let config: DeviceConfig = DEVICE_TOML.parse().unwrap();
        assert_eq!(config.mediator.timeout_ms, 2000);
        assert_eq!(config.mediator.queue_capacity, 32);
        assert_eq!(config.peripherals.len(), 2);

        let ec = config.peripheral("ec-1").unwrap();
        assert_eq!(ec.kind, PeripheralKind::Sensor);
        assert_eq!(ec.poll_interval_ms, 2000);
        assert_eq!(ec.compensation.as_ref().unwrap().threshold, 0.1);
        assert_eq!(ec.setup[0].option, ConfigOption::Led { enabled: false });

        let light = config.peripheral("light-1").unwrap();
        assert_eq!(light.kind, PeripheralKind::Actuator);
        assert_eq!(light.health.minimum_samples, 60);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: DeviceConfig = "".parse().unwrap();
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let peripheral = PeripheralConfig::new("ec-1", PeripheralKind::Sensor, "EC")
            .with_variable("ec", "ec_ms_cm");
        let config = DeviceConfig::default()
            .with_peripheral(peripheral.clone())
            .with_peripheral(peripheral);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePeripheral(name)) if name == "ec-1"
        ));
    }

    #[test]
    fn test_invalid_peripheral_rejected() {
        let toml = r#"
[[peripherals]]
name = "ec-1"
kind = "sensor"
expected_device_type = "EC"
variables = []
"#;
        let err = toml.parse::<DeviceConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Peripheral(_)), "{}", err);
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let toml = r#"
[[peripherals]]
name = "x"
kind = "robot"
expected_device_type = "X"
variables = []
"#;
        assert!(matches!(toml.parse::<DeviceConfig>(), Err(ConfigError::Parse(_))));
    }
}
