//! 外设管理器
//!
//! 每个硬件外设一个 `PeripheralManager`，负责模式状态机、轮询、温度补偿与健康度。
//!
//! # 模式来源
//!
//! 模式以共享状态中的 `peripherals.<name>.mode` 为准：控制线程通过原子比较替换
//! 改写它（进入/退出校准、复位、关闭），管理器在每一步开始时读取它。
//! 管理器自己的转换同样使用比较替换，从不覆盖控制线程并发写入的模式。
//!
//! # 两类失败
//!
//! - 轮询读数失败：记录日志、计入健康度、保留上一次的读数，循环继续
//! - 探测/配置/复位/关闭失败：外设进入 ERROR，只有外部 reset 命令能离开

use crate::config::PeripheralConfig;
use crate::driver::PeripheralDriver;
use crate::error::{PeripheralError, Stage};
use crate::firmware::parse_firmware_version;
use crate::health::HealthTracker;
use semver::Version;
use sprout_state::{Health, PeripheralKind, PeripheralMode, SharedState, ValueView};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 补偿差值的浮点容差：`25.2 - 25.1` 这类差值略小于 0.1，仍视为达到阈值
const COMPENSATION_TOLERANCE: f64 = 1e-9;

/// 单步执行结果（决定轮询线程接下来是否休眠）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// 完成一个轮询周期，按节拍休眠
    Poll,
    /// 完成一次模式转换，立即执行下一步
    Transition,
    /// 无事可做（ERROR），按节拍休眠等待外部命令
    Idle,
    /// 已完成关闭，线程应退出
    Terminated,
}

/// 外设状态快照（诊断用）
#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralStatus {
    pub name: String,
    pub mode: PeripheralMode,
    pub health: Health,
    pub missed_reading_count: u64,
    pub total_reading_count: u64,
    pub firmware_version: Option<Version>,
}

/// 外设管理器
pub struct PeripheralManager<D> {
    config: PeripheralConfig,
    driver: D,
    state: Arc<SharedState>,
    health: HealthTracker,
    firmware_version: Option<Version>,
    last_readings: HashMap<String, f64>,
    previous_compensation: Option<f64>,
    terminated: bool,
}

impl<D: PeripheralDriver> PeripheralManager<D> {
    /// 创建管理器并在共享状态中注册外设（模式 INIT，健康 UNKNOWN）
    ///
    /// # 错误
    /// - `PeripheralError::InvalidConfig` / `PeripheralError::Firmware`: 配置校验失败
    pub fn new(
        config: PeripheralConfig,
        driver: D,
        state: Arc<SharedState>,
    ) -> Result<Self, PeripheralError> {
        config.validate()?;
        state.register_peripheral(&config.name);
        let health = HealthTracker::new(config.health.clone());
        Ok(Self {
            config,
            driver,
            state,
            health,
            firmware_version: None,
            last_readings: HashMap::new(),
            previous_compensation: None,
            terminated: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    /// 当前模式（共享状态为准）
    pub fn mode(&self) -> PeripheralMode {
        self.state.peripheral_mode(&self.config.name).unwrap_or_default()
    }

    pub fn health(&self) -> Health {
        self.health.health()
    }

    pub fn missed_reading_count(&self) -> u64 {
        self.health.missed_reading_count()
    }

    pub fn total_reading_count(&self) -> u64 {
        self.health.total_reading_count()
    }

    /// 本地缓存的最新读数
    pub fn last_reading(&self, variable: &str) -> Option<f64> {
        self.last_readings.get(variable).copied()
    }

    /// 上一次成功写入硬件的补偿值
    pub fn previous_compensation(&self) -> Option<f64> {
        self.previous_compensation
    }

    pub fn firmware_version(&self) -> Option<&Version> {
        self.firmware_version.as_ref()
    }

    pub fn status(&self) -> PeripheralStatus {
        PeripheralStatus {
            name: self.config.name.clone(),
            mode: self.mode(),
            health: self.health.health(),
            missed_reading_count: self.health.missed_reading_count(),
            total_reading_count: self.health.total_reading_count(),
            firmware_version: self.firmware_version.clone(),
        }
    }

    /// 按当前模式执行一步
    pub fn step(&mut self) -> Step {
        if self.terminated {
            return Step::Terminated;
        }
        let mode = self.mode();
        match mode {
            PeripheralMode::Init => {
                match self.initialize() {
                    Ok(()) => self.transition(mode, PeripheralMode::Setup),
                    Err(e) => self.fail(mode, e),
                }
                Step::Transition
            },
            PeripheralMode::Setup => {
                match self.setup() {
                    Ok(()) => self.transition(mode, PeripheralMode::Normal),
                    Err(e) => self.fail(mode, e),
                }
                Step::Transition
            },
            PeripheralMode::Normal | PeripheralMode::Calibrate => {
                self.update(mode);
                Step::Poll
            },
            PeripheralMode::Reset => {
                match self.reset() {
                    Ok(()) => self.transition(mode, PeripheralMode::Normal),
                    Err(e) => self.fail(mode, e),
                }
                Step::Transition
            },
            PeripheralMode::Shutdown => match self.shutdown() {
                Ok(()) => {
                    self.terminated = true;
                    Step::Terminated
                },
                Err(e) => {
                    self.fail(mode, e);
                    Step::Idle
                },
            },
            PeripheralMode::Error => Step::Idle,
        }
    }

    /// 比较替换模式；被并发命令抢先时保留命令写入的模式
    fn transition(&self, from: PeripheralMode, to: PeripheralMode) {
        let name = &self.config.name;
        match self.state.transition_peripheral_mode(name, &[from], to) {
            Ok(_) => debug!(peripheral = %name, "Mode {} -> {}", from, to),
            Err(current) => debug!(
                peripheral = %name,
                "Skipped mode {} -> {}, mode changed concurrently to {:?}",
                from, to, current
            ),
        }
    }

    fn fail(&self, from: PeripheralMode, err: PeripheralError) {
        error!(peripheral = %self.config.name, "Failed while in {} mode: {}", from, err);
        self.transition(from, PeripheralMode::Error);
    }

    /// 探测硬件并校验身份
    fn initialize(&mut self) -> Result<(), PeripheralError> {
        let name = &self.config.name;
        debug!(peripheral = %name, "Initializing");

        self.clear_reported_values();

        self.driver.probe().map_err(PeripheralError::hardware(Stage::Probe))?;
        let identity = self
            .driver
            .read_identity()
            .map_err(PeripheralError::hardware(Stage::Identity))?;
        if identity.device_type != self.config.expected_device_type {
            return Err(PeripheralError::IdentityMismatch {
                expected: self.config.expected_device_type.clone(),
                received: identity.device_type,
            });
        }
        self.firmware_version = Some(parse_firmware_version(&identity.firmware_version)?);

        debug!(
            peripheral = %self.config.name,
            "Passed initial health check, firmware {}",
            identity.firmware_version
        );
        Ok(())
    }

    /// 按顺序执行一次性配置步骤；固件过旧的步骤跳过并告警
    fn setup(&mut self) -> Result<(), PeripheralError> {
        let name = &self.config.name;
        debug!(peripheral = %name, "Setting up");

        for step in &self.config.setup {
            if let (Some(min), Some(firmware)) = (&step.min_firmware, &self.firmware_version) {
                let min = parse_firmware_version(min)?;
                if *firmware < min {
                    warn!(
                        peripheral = %name,
                        "Skipping `{}`: firmware {} is older than {}, consider upgrading",
                        step.option, firmware, min
                    );
                    continue;
                }
            }
            debug!(peripheral = %name, "Setup step: {}", step.option);
            self.driver
                .configure(&step.option)
                .map_err(PeripheralError::hardware(Stage::Setup))?;
        }

        debug!(peripheral = %name, "Successfully set up");
        Ok(())
    }

    /// 一个轮询周期：补偿 → 读数 → 发布 → 健康度
    fn update(&mut self, mode: PeripheralMode) {
        if mode == PeripheralMode::Calibrate {
            debug!(peripheral = %self.config.name, "No compensation update in CALIBRATE mode");
        } else {
            self.update_compensation();
        }

        let name = &self.config.name;
        let driver = &mut self.driver;
        let readings: Vec<(String, Result<f64, _>)> = self
            .config
            .variables
            .iter()
            .map(|binding| (binding.variable.clone(), driver.read_value(&binding.channel)))
            .collect();

        let mut missed = false;
        let mut fresh = Vec::with_capacity(readings.len());
        for (variable, result) in readings {
            match result {
                Ok(value) => fresh.push((variable, value)),
                Err(e) => {
                    warn!(peripheral = %name, "Unable to update {}, bad reading: {}", variable, e);
                    missed = true;
                },
            }
        }

        if !fresh.is_empty() {
            // 读数期间模式可能被改为 CALIBRATE，发布前重新读取
            let calibrating = self.mode() == PeripheralMode::Calibrate;
            for (variable, value) in fresh {
                self.publish_reading(&variable, value, calibrating);
            }
        }

        self.update_health(!missed);
    }

    /// 补偿输入变化达到阈值时才写入硬件
    fn update_compensation(&mut self) {
        let Some(compensation) = &self.config.compensation else {
            return;
        };
        let name = &self.config.name;

        let Some(value) = self.state.environment_value(
            PeripheralKind::Sensor,
            ValueView::Reported,
            &compensation.variable,
        ) else {
            debug!(peripheral = %name, "No {} value in shared state to compensate with", compensation.variable);
            return;
        };

        if let Some(previous) = self.previous_compensation
            && (previous - value).abs() + COMPENSATION_TOLERANCE < compensation.threshold
        {
            debug!(peripheral = %name, "Compensation does not require update, value within threshold");
            return;
        }

        match self.driver.write_compensation(value) {
            Ok(()) => {
                debug!(peripheral = %name, "Compensation set to {}", value);
                self.previous_compensation = Some(value);
            },
            Err(e) => warn!(peripheral = %name, "Unable to set compensation value: {}", e),
        }
    }

    /// 写入外设自己的读数；非校准模式下同时写入共享环境状态
    fn publish_reading(&mut self, variable: &str, value: f64, calibrating: bool) {
        self.last_readings.insert(variable.to_string(), value);
        self.state.set_peripheral_reported(&self.config.name, variable, value);
        if !calibrating {
            self.state
                .set_environment_value(self.config.kind, ValueView::Reported, variable, value);
        }
    }

    fn update_health(&mut self, success: bool) {
        let previous = self.health.health();
        let health = self.health.record(success);
        let name = &self.config.name;
        if health != previous {
            info!(peripheral = %name, "Health {} -> {}", previous, health);
        }
        self.state.set_peripheral_health(name, health);

        if health == Health::Poor && self.config.health.escalate_poor {
            error!(peripheral = %name, "Health is POOR, escalating to ERROR");
            if let Err(current) = self.state.transition_peripheral_mode(
                name,
                &[PeripheralMode::Normal, PeripheralMode::Calibrate],
                PeripheralMode::Error,
            ) {
                debug!(peripheral = %name, "Escalation skipped, mode is {:?}", current);
            }
        }
    }

    /// 清除本地与共享状态中的全部读数
    fn clear_reported_values(&mut self) {
        self.last_readings.clear();
        for binding in &self.config.variables {
            self.state.clear_peripheral_reported(&self.config.name, &binding.variable);
            self.state
                .clear_environment_value(self.config.kind, ValueView::Reported, &binding.variable);
        }
    }

    /// 清除读数与统计，然后重新探测并配置
    fn reset(&mut self) -> Result<(), PeripheralError> {
        info!(peripheral = %self.config.name, "Resetting");

        self.clear_reported_values();
        self.health.reset();
        self.state.set_peripheral_health(&self.config.name, Health::Unknown);
        self.previous_compensation = None;

        self.initialize()
            .and_then(|()| self.setup())
            .map_err(|e| match e {
                PeripheralError::Hardware { source, .. } => PeripheralError::Hardware {
                    stage: Stage::Reset,
                    source,
                },
                other => other,
            })?;

        debug!(peripheral = %self.config.name, "Successfully reset");
        Ok(())
    }

    /// 清除读数并静默硬件
    fn shutdown(&mut self) -> Result<(), PeripheralError> {
        info!(peripheral = %self.config.name, "Shutting down");

        self.clear_reported_values();
        self.driver
            .quiesce()
            .map_err(PeripheralError::hardware(Stage::Shutdown))?;

        debug!(peripheral = %self.config.name, "Successfully shut down");
        Ok(())
    }
}
