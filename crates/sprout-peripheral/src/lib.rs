//! 外设层模块
//!
//! 本模块提供单个硬件外设（传感器/执行器）的管理功能，包括：
//! - 驱动边界（`PeripheralDriver` trait）
//! - 模式状态机（INIT → SETUP → NORMAL ⇄ CALIBRATE，ERROR / RESET / SHUTDOWN）
//! - 温度补偿（带滞回阈值）
//! - 健康度统计（连续读数失败的滚动窗口）
//! - 轮询线程（固定节拍，独立于其他外设与控制线程）
//!
//! # 使用场景
//!
//! 每个外设一个 [`PeripheralManager`]，由 [`PeripheralRunner`] 放到独立线程运行。
//! 大多数用户应通过 `sprout-sdk` 的 `Device` 间接使用本模块。

pub mod config;
pub mod driver;
mod error;
pub mod firmware;
pub mod health;
mod manager;
mod runner;
pub mod simulated;

pub use config::{CompensationConfig, PeripheralConfig, SetupStep, VariableBinding};
pub use driver::{ConfigOption, Identity, PeripheralDriver};
pub use error::{DriverError, PeripheralError, Stage};
pub use health::{HealthConfig, HealthTracker};
pub use manager::{PeripheralManager, PeripheralStatus, Step};
pub use runner::PeripheralRunner;
pub use simulated::{SimulatedDriver, SimulationConfig, SimulationHandle};
