//! 测试辅助函数

#![allow(dead_code)]

use sprout_peripheral::{
    ConfigOption, HealthConfig, PeripheralConfig, PeripheralManager, SimulatedDriver,
    SimulationHandle, Step,
};
use sprout_state::{PeripheralKind, PeripheralMode, SharedState};
use std::sync::Arc;

pub const EC_VARIABLE: &str = "water_electrical_conductivity_ms_cm";
pub const TEMPERATURE_VARIABLE: &str = "water_temperature_celsius";

/// EC 传感器配置（与真实电路板的配置步骤一致）
pub fn ec_config() -> PeripheralConfig {
    PeripheralConfig::new("ec-1", PeripheralKind::Sensor, "EC")
        .with_variable("ec", EC_VARIABLE)
        .with_compensation(TEMPERATURE_VARIABLE, 0.1)
        .with_health(HealthConfig {
            minimum_samples: 5,
            update_interval: 1,
            ..HealthConfig::default()
        })
        .with_setup_step(ConfigOption::ProtocolLock { enabled: true }, Some("1.95"))
        .with_setup_step(
            ConfigOption::Output {
                parameter: "EC".to_string(),
                enabled: true,
            },
            Some("1.95"),
        )
        .with_setup_step(ConfigOption::Led { enabled: true }, None)
        .with_setup_step(ConfigOption::ProbeType { value: 1.0 }, None)
}

pub struct Fixture {
    pub manager: PeripheralManager<SimulatedDriver>,
    pub hardware: SimulationHandle,
    pub state: Arc<SharedState>,
}

pub fn fixture_with(config: PeripheralConfig, firmware: &str) -> Fixture {
    let state = Arc::new(SharedState::new());
    let driver = SimulatedDriver::new("EC", firmware);
    let hardware = driver.handle();
    hardware.set_value("ec", 1.0);
    let manager = PeripheralManager::new(config, driver, state.clone()).unwrap();
    Fixture {
        manager,
        hardware,
        state,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(ec_config(), "2.0")
}

/// 从 INIT 运行到 NORMAL
pub fn bring_up(f: &mut Fixture) {
    assert_eq!(f.manager.step(), Step::Transition);
    assert_eq!(f.manager.step(), Step::Transition);
    assert_eq!(f.manager.mode(), PeripheralMode::Normal);
}
