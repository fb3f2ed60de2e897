//! 模拟驱动
//!
//! 无硬件时使用的进程内驱动。硬件状态放在 [`SimulationHandle`] 中，
//! 驱动被移动到轮询线程之后，仍可通过句柄注入故障、修改读数或检查写入记录。

use crate::config::PeripheralConfig;
use crate::driver::{ConfigOption, Identity, PeripheralDriver};
use crate::error::DriverError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 模拟驱动参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 上报的设备类型（缺省与 `expected_device_type` 相同）
    pub device_type: Option<String>,
    /// 上报的固件版本
    pub firmware_version: String,
    /// 各通道的初始读数
    pub values: BTreeMap<String, f64>,
    /// 每 N 次读数失败一次（用于演示健康度下降）
    pub fail_every: Option<u32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            device_type: None,
            firmware_version: "2.0".to_string(),
            values: BTreeMap::new(),
            fail_every: None,
        }
    }
}

/// 模拟硬件状态
#[derive(Debug, Clone)]
struct SimulatedHardware {
    identity: Identity,
    values: HashMap<String, f64>,
    fail_every: Option<u32>,
    fail_reads: bool,
    fail_probe: bool,
    fail_configure: bool,
    fail_quiesce: bool,
    read_count: u64,
    compensation_writes: Vec<f64>,
    configured: Vec<ConfigOption>,
    quiesced: bool,
}

/// 模拟硬件句柄（可克隆，跨线程共享）
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    inner: Arc<Mutex<SimulatedHardware>>,
}

impl SimulationHandle {
    /// 设置通道读数
    pub fn set_value(&self, channel: &str, value: f64) {
        self.inner.lock().values.insert(channel.to_string(), value);
    }

    /// 令所有读数失败（或恢复）
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    pub fn set_fail_probe(&self, fail: bool) {
        self.inner.lock().fail_probe = fail;
    }

    pub fn set_fail_configure(&self, fail: bool) {
        self.inner.lock().fail_configure = fail;
    }

    pub fn set_fail_quiesce(&self, fail: bool) {
        self.inner.lock().fail_quiesce = fail;
    }

    /// 修改上报身份
    pub fn set_identity(&self, device_type: &str, firmware_version: &str) {
        self.inner.lock().identity = Identity {
            device_type: device_type.to_string(),
            firmware_version: firmware_version.to_string(),
        };
    }

    /// 已写入的补偿值（按时间顺序）
    pub fn compensation_writes(&self) -> Vec<f64> {
        self.inner.lock().compensation_writes.clone()
    }

    /// 已执行的配置项（按时间顺序）
    pub fn configured(&self) -> Vec<ConfigOption> {
        self.inner.lock().configured.clone()
    }

    /// 读数尝试次数
    pub fn read_count(&self) -> u64 {
        self.inner.lock().read_count
    }

    /// 是否已静默
    pub fn is_quiesced(&self) -> bool {
        self.inner.lock().quiesced
    }
}

/// 模拟驱动
#[derive(Debug)]
pub struct SimulatedDriver {
    handle: SimulationHandle,
}

impl SimulatedDriver {
    /// 以给定身份创建模拟驱动
    pub fn new(device_type: &str, firmware_version: &str) -> Self {
        let hardware = SimulatedHardware {
            identity: Identity {
                device_type: device_type.to_string(),
                firmware_version: firmware_version.to_string(),
            },
            values: HashMap::new(),
            fail_every: None,
            fail_reads: false,
            fail_probe: false,
            fail_configure: false,
            fail_quiesce: false,
            read_count: 0,
            compensation_writes: Vec::new(),
            configured: Vec::new(),
            quiesced: false,
        };
        Self {
            handle: SimulationHandle {
                inner: Arc::new(Mutex::new(hardware)),
            },
        }
    }

    /// 按外设配置中的 `simulation` 段创建
    pub fn from_config(config: &PeripheralConfig) -> Self {
        let simulation = config.simulation.clone().unwrap_or_default();
        let device_type = simulation
            .device_type
            .as_deref()
            .unwrap_or(&config.expected_device_type);
        let driver = Self::new(device_type, &simulation.firmware_version);
        {
            let mut hardware = driver.handle.inner.lock();
            hardware.values = simulation.values.into_iter().collect();
            hardware.fail_every = simulation.fail_every.filter(|n| *n > 0);
        }
        driver
    }

    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }
}

impl PeripheralDriver for SimulatedDriver {
    fn probe(&mut self) -> Result<(), DriverError> {
        let mut hardware = self.handle.inner.lock();
        if hardware.fail_probe {
            return Err(DriverError::io("simulated probe failure: no ack"));
        }
        hardware.quiesced = false;
        Ok(())
    }

    fn read_identity(&mut self) -> Result<Identity, DriverError> {
        Ok(self.handle.inner.lock().identity.clone())
    }

    fn read_value(&mut self, channel: &str) -> Result<f64, DriverError> {
        let mut hardware = self.handle.inner.lock();
        hardware.read_count += 1;
        if hardware.fail_reads {
            return Err(DriverError::Timeout);
        }
        if let Some(n) = hardware.fail_every
            && hardware.read_count.is_multiple_of(u64::from(n))
        {
            return Err(DriverError::InvalidResponse("simulated bad reading".to_string()));
        }
        hardware
            .values
            .get(channel)
            .copied()
            .ok_or_else(|| DriverError::Unsupported(format!("channel `{}`", channel)))
    }

    fn write_compensation(&mut self, value: f64) -> Result<(), DriverError> {
        self.handle.inner.lock().compensation_writes.push(value);
        Ok(())
    }

    fn configure(&mut self, option: &ConfigOption) -> Result<(), DriverError> {
        let mut hardware = self.handle.inner.lock();
        if hardware.fail_configure {
            return Err(DriverError::io(format!("simulated failure to {}", option)));
        }
        hardware.configured.push(option.clone());
        Ok(())
    }

    fn quiesce(&mut self) -> Result<(), DriverError> {
        let mut hardware = self.handle.inner.lock();
        if hardware.fail_quiesce {
            return Err(DriverError::io("simulated sleep command rejected"));
        }
        hardware.quiesced = true;
        Ok(())
    }
}
