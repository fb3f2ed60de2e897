//! SDK 错误类型定义

use sprout_peripheral::PeripheralError;
use std::path::PathBuf;
use thiserror::Error;

/// 设备配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 外设名称重复
    #[error("Duplicate peripheral name `{0}`")]
    DuplicatePeripheral(String),

    /// 中介配置无效
    #[error("Invalid mediator config: {0}")]
    Mediator(String),

    /// 外设配置无效
    #[error(transparent)]
    Peripheral(#[from] PeripheralError),
}

/// 设备构建/运行错误
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 外设管理器或轮询线程创建失败
    #[error("Peripheral `{name}` failed to start: {source}")]
    Peripheral {
        name: String,
        #[source]
        source: PeripheralError,
    },

    /// 控制线程创建失败
    #[error("Failed to spawn control thread: {0}")]
    ControlThread(#[source] std::io::Error),
}
