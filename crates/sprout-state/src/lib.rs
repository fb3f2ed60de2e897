//! 共享状态层
//!
//! 本 crate 提供 Sprout 设备进程内唯一的共享可变资源：按分区划分的状态存储。
//!
//! - **分区**：`device`、`recipe`、`environment`（sensor/actuator × reported/desired）、
//!   以及每个外设自己的 `mode`/`health`/reported 值
//! - **并发**：每个分区一把 `parking_lot::RwLock`，临界区内不做任何 IO
//! - **值类型**：`serde_json::Value`，缺失即"无值"，从不视为错误
//!
//! 所有组件通过注入的 `Arc<SharedState>` 访问状态，没有任何静态全局变量。

mod error;
pub mod keys;
pub mod mode;
mod store;
mod thread;

pub use error::StateError;
pub use mode::{DeviceMode, Health, PeripheralKind, PeripheralMode, RecipeMode, ValueView};
pub use store::{ModeSnapshot, PeripheralSnapshot, Section, SharedState};
pub use thread::JoinTimeout;

/// 状态值类型（重新导出，调用方无需直接依赖 serde_json）
pub use serde_json::Value;
