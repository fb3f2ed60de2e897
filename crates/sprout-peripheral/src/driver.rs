//! 驱动边界
//!
//! 每个外设的具体硬件传输（I2C、串口等）由实现 [`PeripheralDriver`] 的类型负责。
//! 管理器只通过这里定义的六个操作与硬件交互，全部可失败。

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 硬件身份信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// 设备类型（如 "EC"）
    pub device_type: String,
    /// 固件版本（如 "1.95"）
    pub firmware_version: String,
}

/// 一次性配置项
///
/// 在 TOML 中以内联表表示，例如 `{ kind = "output", parameter = "EC", enabled = true }`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigOption {
    /// 协议锁（防止硬件被切换到其他总线协议）
    ProtocolLock { enabled: bool },
    /// 输出通道使能
    Output { parameter: String, enabled: bool },
    /// 指示灯
    Led { enabled: bool },
    /// 探头类型常数（如 K 值 1.0）
    ProbeType { value: f64 },
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |enabled: &bool| if *enabled { "enable" } else { "disable" };
        match self {
            Self::ProtocolLock { enabled } => write!(f, "{} protocol lock", on_off(enabled)),
            Self::Output { parameter, enabled } => {
                write!(f, "{} {} output", on_off(enabled), parameter)
            },
            Self::Led { enabled } => write!(f, "{} led", on_off(enabled)),
            Self::ProbeType { value } => write!(f, "set probe type {:.1}", value),
        }
    }
}

/// 外设驱动 trait
///
/// 实现者会被移动到外设的轮询线程中，因此需要 `Send`。
/// 所有调用都是阻塞的；挂起的调用只会阻塞当前外设的线程。
pub trait PeripheralDriver: Send {
    /// 探测硬件是否在线
    fn probe(&mut self) -> Result<(), DriverError>;

    /// 读取设备类型与固件版本
    fn read_identity(&mut self) -> Result<Identity, DriverError>;

    /// 读取指定通道的测量值（执行器为当前施加值）
    fn read_value(&mut self, channel: &str) -> Result<f64, DriverError>;

    /// 写入补偿输入（如补偿温度）
    fn write_compensation(&mut self, value: f64) -> Result<(), DriverError>;

    /// 写入一次性配置项
    fn configure(&mut self, option: &ConfigOption) -> Result<(), DriverError>;

    /// 静默硬件（低功耗/休眠）
    fn quiesce(&mut self) -> Result<(), DriverError>;
}

impl<D: PeripheralDriver + ?Sized> PeripheralDriver for Box<D> {
    fn probe(&mut self) -> Result<(), DriverError> {
        (**self).probe()
    }

    fn read_identity(&mut self) -> Result<Identity, DriverError> {
        (**self).read_identity()
    }

    fn read_value(&mut self, channel: &str) -> Result<f64, DriverError> {
        (**self).read_value(channel)
    }

    fn write_compensation(&mut self, value: f64) -> Result<(), DriverError> {
        (**self).write_compensation(value)
    }

    fn configure(&mut self, option: &ConfigOption) -> Result<(), DriverError> {
        (**self).configure(option)
    }

    fn quiesce(&mut self) -> Result<(), DriverError> {
        (**self).quiesce()
    }
}
