//! 外设层错误类型定义
//!
//! 两类结果严格分开：
//! - [`DriverError`]：驱动调用失败。轮询读数失败只计入健康度，从不向上传播。
//! - [`PeripheralError`]：探测/配置/复位/关闭的硬失败，一律使外设进入 ERROR。

use std::fmt;
use thiserror::Error;

/// 驱动层错误类型
///
/// 只携带用于日志的 trace 文本，不携带结构化恢复信息。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 总线/硬件 IO 错误
    #[error("Hardware IO error: {trace}")]
    Io { trace: String },

    /// 硬件响应超时
    #[error("Driver timeout")]
    Timeout,

    /// 硬件返回了无法解析的数据
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 驱动不支持该通道或配置项
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl DriverError {
    /// 构造 IO 错误
    pub fn io(trace: impl Into<String>) -> Self {
        Self::Io {
            trace: trace.into(),
        }
    }
}

/// 生命周期阶段（用于错误上下文）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Identity,
    Setup,
    Reset,
    Shutdown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Probe => "probe",
            Self::Identity => "identity check",
            Self::Setup => "setup",
            Self::Reset => "reset",
            Self::Shutdown => "shutdown",
        })
    }
}

/// 外设层错误类型
#[derive(Error, Debug)]
pub enum PeripheralError {
    /// 生命周期阶段中的驱动失败
    #[error("Peripheral {stage} failed: {source}")]
    Hardware {
        stage: Stage,
        #[source]
        source: DriverError,
    },

    /// 硬件身份与配置不符
    #[error("Incorrect device type. Expecting `{expected}`, received `{received}`")]
    IdentityMismatch { expected: String, received: String },

    /// 固件版本无法解析
    #[error("Invalid firmware version `{version}`: {source}")]
    Firmware {
        version: String,
        #[source]
        source: semver::Error,
    },

    /// 外设配置无效
    #[error("Invalid peripheral config: {0}")]
    InvalidConfig(String),

    /// 轮询线程启动失败
    #[error("Failed to spawn polling thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

impl PeripheralError {
    pub(crate) fn hardware(stage: Stage) -> impl FnOnce(DriverError) -> Self {
        move |source| Self::Hardware { stage, source }
    }
}
