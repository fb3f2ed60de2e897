//! # Sprout SDK
//!
//! 栽培设备控制核心的统一入口。
//!
//! ## 分层
//!
//! - [`sprout_state`]：按分区加锁的共享状态存储
//! - [`sprout_peripheral`]：驱动边界、外设模式状态机、健康度与轮询线程
//! - [`sprout_event`]：事件中介与唯一的控制线程
//! - 本 crate：TOML 设备配置、[`Device`] 装配与日志初始化
//!
//! ## 快速开始
//!
//! ```no_run
//! use sprout_sdk::prelude::*;
//! use std::time::Duration;
//!
//! sprout_sdk::init_logging("sprout=info");
//! let config = DeviceConfig::load("device.toml").unwrap();
//! let device = Device::builder().config(config).build().unwrap();
//!
//! let response = device.submit(EventRequest::start_recipe("basil-1", None));
//! println!("{}", response);
//!
//! device.shutdown(Duration::from_secs(5));
//! ```

mod config;
mod device;
mod error;
mod logging;

pub use config::DeviceConfig;
pub use device::{Device, DeviceBuilder};
pub use error::{ConfigError, DeviceError};
pub use logging::init_logging;

pub use sprout_event;
pub use sprout_peripheral;
pub use sprout_state;

/// 常用类型
pub mod prelude {
    pub use crate::{ConfigError, Device, DeviceBuilder, DeviceConfig, DeviceError};
    pub use sprout_event::{EventMediator, EventRequest, EventResponse, PeripheralCommand};
    pub use sprout_peripheral::{PeripheralConfig, PeripheralDriver, PeripheralStatus};
    pub use sprout_state::{
        DeviceMode, Health, ModeSnapshot, PeripheralKind, PeripheralMode, RecipeMode, SharedState,
    };
}
