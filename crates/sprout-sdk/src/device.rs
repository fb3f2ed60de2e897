//! 设备装配
//!
//! [`DeviceBuilder`] 把共享状态、事件中介、控制线程和每个外设的轮询线程装配成一个
//! [`Device`]。未显式提供驱动的外设使用模拟驱动（按配置中的 `simulation` 段）。

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use sprout_event::{
    CommandHandler, ControlThread, EventMediator, EventRequest, EventResponse,
    InMemoryRecipeRepository, PeripheralCommand, RecipeRepository, channel,
};
use sprout_peripheral::{
    PeripheralDriver, PeripheralManager, PeripheralRunner, PeripheralStatus, SimulatedDriver,
    SimulationHandle,
};
use sprout_state::{ModeSnapshot, SharedState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Device Builder（链式构造）
///
/// # Example
///
/// ```
/// use sprout_sdk::{DeviceBuilder, DeviceConfig};
/// use sprout_sdk::sprout_event::EventRequest;
///
/// let device = DeviceBuilder::new()
///     .config(DeviceConfig::default())
///     .build()
///     .unwrap();
/// let response = device.submit(EventRequest::StopRecipe);
/// assert_eq!(response.status, 400);
/// ```
pub struct DeviceBuilder {
    config: DeviceConfig,
    state: Option<Arc<SharedState>>,
    recipes: Option<Box<dyn RecipeRepository>>,
    drivers: HashMap<String, Box<dyn PeripheralDriver>>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self {
            config: DeviceConfig::default(),
            state: None,
            recipes: None,
            drivers: HashMap::new(),
        }
    }

    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// 使用外部创建的共享状态（缺省新建）
    pub fn state(mut self, state: Arc<SharedState>) -> Self {
        self.state = Some(state);
        self
    }

    /// 配方存储后端（缺省为内存实现）
    pub fn recipes(mut self, recipes: impl RecipeRepository + 'static) -> Self {
        self.recipes = Some(Box::new(recipes));
        self
    }

    /// 为指定外设提供硬件驱动
    pub fn driver(
        mut self,
        peripheral: impl Into<String>,
        driver: impl PeripheralDriver + 'static,
    ) -> Self {
        self.drivers.insert(peripheral.into(), Box::new(driver));
        self
    }

    /// 校验配置并启动控制线程与全部轮询线程
    ///
    /// # 错误
    /// - `DeviceError::Config`: 配置校验失败
    /// - `DeviceError::ControlThread` / `DeviceError::Peripheral`: 线程或管理器创建失败
    pub fn build(self) -> Result<Device, DeviceError> {
        let Self {
            config,
            state,
            recipes,
            mut drivers,
        } = self;
        config.validate()?;

        for name in drivers.keys() {
            if config.peripheral(name).is_none() {
                warn!("Driver supplied for unconfigured peripheral `{}`, ignoring", name);
            }
        }

        let state = state.unwrap_or_default();
        let recipes = recipes
            .unwrap_or_else(|| Box::new(InMemoryRecipeRepository::new()) as Box<dyn RecipeRepository>);

        let (mediator, queue) = channel(&config.mediator);
        let control = ControlThread::spawn(queue, CommandHandler::new(state.clone(), recipes))
            .map_err(DeviceError::ControlThread)?;

        let mut runners = Vec::with_capacity(config.peripherals.len());
        let mut simulations = HashMap::new();
        for peripheral in &config.peripherals {
            let name = peripheral.name.clone();
            let driver = match drivers.remove(&name) {
                Some(driver) => driver,
                None => {
                    let simulated = SimulatedDriver::from_config(peripheral);
                    simulations.insert(name.clone(), simulated.handle());
                    info!(peripheral = %name, "No hardware driver supplied, using simulated driver");
                    Box::new(simulated) as Box<dyn PeripheralDriver>
                },
            };

            let manager = PeripheralManager::new(peripheral.clone(), driver, state.clone())
                .map_err(|source| DeviceError::Peripheral {
                    name: name.clone(),
                    source,
                })?;
            let runner = PeripheralRunner::spawn(manager)
                .map_err(|source| DeviceError::Peripheral { name, source })?;
            runners.push(runner);
        }

        info!("Device started with {} peripherals", runners.len());
        Ok(Device {
            runners,
            control: Some(control),
            mediator,
            state,
            simulations,
        })
    }
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行中的设备
///
/// Drop 时停止全部轮询线程与控制线程（不向硬件发送静默命令；
/// 需要静默硬件时使用 [`Device::shutdown`]）。
pub struct Device {
    // 字段按声明顺序析构：轮询线程先于控制线程退出
    runners: Vec<PeripheralRunner>,
    control: Option<ControlThread>,
    mediator: EventMediator,
    state: Arc<SharedState>,
    simulations: HashMap<String, SimulationHandle>,
}

impl Device {
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::new()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// 中介句柄（可克隆后交给其他线程）
    pub fn mediator(&self) -> EventMediator {
        self.mediator.clone()
    }

    pub fn submit(&self, request: EventRequest) -> EventResponse {
        self.mediator.submit(request)
    }

    pub fn mode_snapshot(&self) -> ModeSnapshot {
        self.state.mode_snapshot()
    }

    /// 各外设的最新状态快照
    pub fn peripheral_status(&self) -> Vec<Arc<PeripheralStatus>> {
        self.runners.iter().map(|runner| runner.status()).collect()
    }

    /// 模拟外设的硬件句柄（用于注入读数或故障）
    pub fn simulation(&self, peripheral: &str) -> Option<&SimulationHandle> {
        self.simulations.get(peripheral)
    }

    /// 通过中介让每个外设进入 SHUTDOWN，等待轮询线程退出后停止控制线程
    ///
    /// 超时仍未退出的轮询线程在析构时被强制通知停止。
    pub fn shutdown(mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;

        for runner in &self.runners {
            let request =
                EventRequest::peripheral_command(runner.name(), PeripheralCommand::Shutdown);
            let response = self.mediator.submit(request);
            if !response.is_success() {
                warn!(peripheral = %runner.name(), "Shutdown command not applied: {}", response);
            }
        }

        while Instant::now() < deadline && !self.runners.iter().all(|r| r.is_finished()) {
            std::thread::sleep(Duration::from_millis(20));
        }
        for runner in self.runners.iter().filter(|r| !r.is_finished()) {
            warn!(peripheral = %runner.name(), "Polling thread did not finish shutting down in time");
        }
        self.runners.clear();

        if let Some(control) = self.control.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            control.shutdown(remaining.max(Duration::from_millis(100)));
        }
        info!("Device stopped");
    }
}
