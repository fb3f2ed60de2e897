//! 模式与分类定义
//!
//! 定义设备、配方、外设三级状态机的模式值，以及外设健康分类。
//! 所有枚举以 `SCREAMING_SNAKE_CASE` 字符串形式存入共享状态。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 外设工作模式
///
/// # 模式说明
///
/// - **Init**: 初始模式，探测硬件并校验身份
/// - **Setup**: 一次性配置（输出通道、探头类型等）
/// - **Normal**: 稳态轮询，读数写入共享环境状态
/// - **Calibrate**: 校准中，继续轮询但读数不进入共享环境状态
/// - **Error**: 错误，只能通过外部 reset 命令离开
/// - **Reset**: 清除缓存读数后重新探测并配置
/// - **Shutdown**: 关闭（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeripheralMode {
    #[default]
    Init,
    Setup,
    Normal,
    Calibrate,
    Error,
    Reset,
    Shutdown,
}

impl PeripheralMode {
    /// 字符串形式（与共享状态中的存储形式一致）
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Setup => "SETUP",
            Self::Normal => "NORMAL",
            Self::Calibrate => "CALIBRATE",
            Self::Error => "ERROR",
            Self::Reset => "RESET",
            Self::Shutdown => "SHUTDOWN",
        }
    }

    /// 是否处于轮询模式（Normal 或 Calibrate）
    pub fn is_polling(self) -> bool {
        matches!(self, Self::Normal | Self::Calibrate)
    }
}

impl fmt::Display for PeripheralMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备级模式（仅由控制线程修改）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceMode {
    #[default]
    Init,
    Normal,
    Error,
    Shutdown,
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::Normal => "NORMAL",
            Self::Error => "ERROR",
            Self::Shutdown => "SHUTDOWN",
        };
        f.write_str(s)
    }
}

/// 配方级模式（仅由控制线程修改）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipeMode {
    /// 没有正在运行的配方
    #[default]
    NoRecipe,
    /// 配方运行中
    Normal,
}

impl RecipeMode {
    /// 配方是否正在运行
    pub fn is_running(self) -> bool {
        self == Self::Normal
    }
}

impl fmt::Display for RecipeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoRecipe => "NO_RECIPE",
            Self::Normal => "NORMAL",
        };
        f.write_str(s)
    }
}

/// 外设健康分类
///
/// 只是信息，不会自行触发模式转换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// 样本数不足 `minimum_samples`
    #[default]
    Unknown,
    /// 失败率低于阈值
    Good,
    /// 失败率达到或超过阈值
    Poor,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::Good => "GOOD",
            Self::Poor => "POOR",
        };
        f.write_str(s)
    }
}

/// 外设类型标签
///
/// 传感器与执行器共用同一套轮询逻辑，只在写入哪个环境分区上有区别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralKind {
    Sensor,
    Actuator,
}

impl PeripheralKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
        }
    }
}

impl fmt::Display for PeripheralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 环境值视图：实测/已施加值 vs. 设定值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueView {
    Reported,
    Desired,
}

impl fmt::Display for ValueView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reported => "reported",
            Self::Desired => "desired",
        })
    }
}
