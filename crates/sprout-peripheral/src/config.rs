//! 外设配置
//!
//! 通常作为 `DeviceConfig` 中的 `[[peripherals]]` 表从 TOML 加载。

use crate::driver::ConfigOption;
use crate::error::PeripheralError;
use crate::firmware::parse_firmware_version;
use crate::health::HealthConfig;
use crate::simulated::SimulationConfig;
use serde::{Deserialize, Serialize};
use sprout_state::PeripheralKind;
use std::collections::HashSet;
use std::time::Duration;

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_compensation_threshold() -> f64 {
    0.1
}

/// 硬件通道到环境变量名的绑定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBinding {
    /// 驱动通道名
    pub channel: String,
    /// 共享环境状态中的变量名
    pub variable: String,
}

/// 补偿输入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationConfig {
    /// 从 `environment.sensor.reported` 读取的变量名（如环境温度）
    pub variable: String,
    /// 滞回阈值：与上次写入值相差小于该值时不重复写入
    #[serde(default = "default_compensation_threshold")]
    pub threshold: f64,
}

/// 一次性配置步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupStep {
    pub option: ConfigOption,
    /// 需要的最低固件版本；更旧的固件跳过该步骤并告警
    #[serde(default)]
    pub min_firmware: Option<String>,
}

/// 外设配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralConfig {
    /// 外设名称（共享状态中的键）
    pub name: String,
    /// 传感器或执行器
    pub kind: PeripheralKind,
    /// 期望的硬件设备类型（身份校验）
    pub expected_device_type: String,
    /// 轮询周期（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 读取的通道
    pub variables: Vec<VariableBinding>,
    /// 补偿输入（可选）
    #[serde(default)]
    pub compensation: Option<CompensationConfig>,
    /// 健康度参数
    #[serde(default)]
    pub health: HealthConfig,
    /// 一次性配置步骤（按顺序执行）
    #[serde(default)]
    pub setup: Vec<SetupStep>,
    /// 模拟驱动参数（无硬件运行时使用）
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

impl PeripheralConfig {
    /// 创建最小配置（其余字段取默认值）
    pub fn new(
        name: impl Into<String>,
        kind: PeripheralKind,
        expected_device_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            expected_device_type: expected_device_type.into(),
            poll_interval_ms: default_poll_interval_ms(),
            variables: Vec::new(),
            compensation: None,
            health: HealthConfig::default(),
            setup: Vec::new(),
            simulation: None,
        }
    }

    /// 添加通道绑定
    pub fn with_variable(mut self, channel: impl Into<String>, variable: impl Into<String>) -> Self {
        self.variables.push(VariableBinding {
            channel: channel.into(),
            variable: variable.into(),
        });
        self
    }

    /// 设置补偿输入
    pub fn with_compensation(mut self, variable: impl Into<String>, threshold: f64) -> Self {
        self.compensation = Some(CompensationConfig {
            variable: variable.into(),
            threshold,
        });
        self
    }

    /// 添加配置步骤
    pub fn with_setup_step(mut self, option: ConfigOption, min_firmware: Option<&str>) -> Self {
        self.setup.push(SetupStep {
            option,
            min_firmware: min_firmware.map(str::to_string),
        });
        self
    }

    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.health = health;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 校验配置
    ///
    /// # 错误
    /// - `PeripheralError::InvalidConfig`: 名称为空、没有通道、变量重复、阈值非法
    /// - `PeripheralError::Firmware`: `min_firmware` 无法解析
    pub fn validate(&self) -> Result<(), PeripheralError> {
        let invalid = |msg: String| PeripheralError::InvalidConfig(format!("{}: {}", self.name, msg));

        if self.name.trim().is_empty() {
            return Err(PeripheralError::InvalidConfig("peripheral name is empty".to_string()));
        }
        if self.variables.is_empty() {
            return Err(invalid("at least one variable is required".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be >= 1".to_string()));
        }
        let mut seen = HashSet::new();
        for binding in &self.variables {
            if !seen.insert(binding.variable.as_str()) {
                return Err(invalid(format!("duplicate variable `{}`", binding.variable)));
            }
        }
        if let Some(compensation) = &self.compensation
            && !(compensation.threshold >= 0.0)
        {
            return Err(invalid(format!(
                "compensation threshold must be >= 0, got {}",
                compensation.threshold
            )));
        }
        self.health.validate().map_err(invalid)?;
        for step in &self.setup {
            if let Some(min) = &step.min_firmware {
                parse_firmware_version(min)?;
            }
        }
        Ok(())
    }
}
