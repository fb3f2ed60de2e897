//! 外设管理器状态机集成测试
//!
//! 使用模拟驱动逐步驱动 `PeripheralManager::step()`，验证模式转换、
//! 校准期间的读数隔离、补偿滞回、复位与关闭语义。

mod common;

use common::*;
use sprout_peripheral::{
    ConfigOption, DriverError, HealthConfig, Identity, PeripheralConfig, PeripheralDriver,
    PeripheralManager, PeripheralRunner, SimulatedDriver, Step,
};
use sprout_state::{Health, PeripheralKind, PeripheralMode, SharedState, ValueView};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

fn env_ec(state: &SharedState) -> Option<f64> {
    state.environment_value(PeripheralKind::Sensor, ValueView::Reported, EC_VARIABLE)
}

fn set_temperature(state: &SharedState, value: f64) {
    state.set_environment_value(
        PeripheralKind::Sensor,
        ValueView::Reported,
        TEMPERATURE_VARIABLE,
        value,
    );
}

// ==================== 启动 ====================

#[test]
fn test_startup_runs_all_setup_steps_on_new_firmware() {
    let mut f = fixture();
    bring_up(&mut f);
    assert_eq!(f.hardware.configured().len(), 4);
}

#[test]
fn test_old_firmware_skips_gated_steps() {
    let mut f = fixture_with(ec_config(), "1.9");
    bring_up(&mut f);
    assert_eq!(
        f.hardware.configured(),
        vec![
            ConfigOption::Led { enabled: true },
            ConfigOption::ProbeType { value: 1.0 }
        ]
    );
}

#[test]
fn test_probe_failure_enters_error() {
    let mut f = fixture();
    f.hardware.set_fail_probe(true);
    assert_eq!(f.manager.step(), Step::Transition);
    assert_eq!(f.manager.mode(), PeripheralMode::Error);

    // ERROR 只能由外部复位离开，不会自行重试
    f.hardware.set_fail_probe(false);
    assert_eq!(f.manager.step(), Step::Idle);
    assert_eq!(f.manager.mode(), PeripheralMode::Error);
}

#[test]
fn test_identity_mismatch_enters_error() {
    let mut f = fixture();
    f.hardware.set_identity("PH", "2.0");
    f.manager.step();
    assert_eq!(f.manager.mode(), PeripheralMode::Error);
    assert_eq!(f.state.peripheral_mode("ec-1"), Some(PeripheralMode::Error));
}

#[test]
fn test_setup_failure_enters_error() {
    let mut f = fixture();
    f.hardware.set_fail_configure(true);
    f.manager.step();
    assert_eq!(f.manager.mode(), PeripheralMode::Setup);
    f.manager.step();
    assert_eq!(f.manager.mode(), PeripheralMode::Error);
}

#[test]
fn test_shutdown_requested_during_setup() {
    let mut f = fixture();
    f.manager.step();
    // SETUP 期间控制线程要求关闭：配置完成后不能把模式改回 NORMAL
    f.state.set_peripheral_mode("ec-1", PeripheralMode::Shutdown);
    assert_eq!(f.manager.step(), Step::Terminated);
    assert_eq!(f.manager.mode(), PeripheralMode::Shutdown);
}

// ==================== 轮询 ====================

#[test]
fn test_failed_read_keeps_previous_value() {
    let mut f = fixture();
    bring_up(&mut f);
    f.manager.step();
    assert_eq!(env_ec(&f.state), Some(1.0));

    f.hardware.set_value("ec", 2.0);
    f.hardware.set_fail_reads(true);
    assert_eq!(f.manager.step(), Step::Poll);
    assert_eq!(f.manager.mode(), PeripheralMode::Normal);
    assert_eq!(env_ec(&f.state), Some(1.0));
    assert_eq!(f.manager.missed_reading_count(), 1);
    assert_eq!(f.manager.total_reading_count(), 2);
}

#[test]
fn test_calibrate_withholds_environment_updates() {
    let mut f = fixture();
    bring_up(&mut f);
    f.manager.step();
    assert_eq!(env_ec(&f.state), Some(1.0));

    f.state
        .transition_peripheral_mode("ec-1", &[PeripheralMode::Normal], PeripheralMode::Calibrate)
        .unwrap();
    f.hardware.set_value("ec", 3.0);
    f.manager.step();
    assert_eq!(env_ec(&f.state), Some(1.0));
    assert_eq!(f.state.peripheral_reported("ec-1", EC_VARIABLE), Some(3.0));
    assert_eq!(f.manager.last_reading(EC_VARIABLE), Some(3.0));

    f.state
        .transition_peripheral_mode("ec-1", &[PeripheralMode::Calibrate], PeripheralMode::Normal)
        .unwrap();
    f.hardware.set_value("ec", 4.0);
    f.manager.step();
    assert_eq!(env_ec(&f.state), Some(4.0));
}

#[test]
fn test_compensation_hysteresis() {
    let mut f = fixture();
    bring_up(&mut f);

    // 共享状态中没有温度时不写入
    f.manager.step();
    assert!(f.hardware.compensation_writes().is_empty());

    set_temperature(&f.state, 20.0);
    f.manager.step();
    assert_eq!(f.hardware.compensation_writes(), vec![20.0]);

    set_temperature(&f.state, 20.05);
    f.manager.step();
    assert_eq!(f.hardware.compensation_writes(), vec![20.0]);

    set_temperature(&f.state, 20.15);
    f.manager.step();
    assert_eq!(f.hardware.compensation_writes(), vec![20.0, 20.15]);
    assert_eq!(f.manager.previous_compensation(), Some(20.15));
}

#[test]
fn test_compensation_threshold_is_inclusive() {
    let config = ec_config().with_compensation(TEMPERATURE_VARIABLE, 0.5);
    let mut f = fixture_with(config, "2.0");
    bring_up(&mut f);

    set_temperature(&f.state, 20.0);
    f.manager.step();
    set_temperature(&f.state, 20.5);
    f.manager.step();
    assert_eq!(f.hardware.compensation_writes(), vec![20.0, 20.5]);
}

#[test]
fn test_compensation_tenth_degree_steps() {
    let mut f = fixture();
    bring_up(&mut f);

    for temperature in [25.1, 25.2, 25.3] {
        set_temperature(&f.state, temperature);
        f.manager.step();
    }
    assert_eq!(f.hardware.compensation_writes(), vec![25.1, 25.2, 25.3]);

    // 略小于阈值的变化仍然跳过
    set_temperature(&f.state, 25.39);
    f.manager.step();
    assert_eq!(f.hardware.compensation_writes(), vec![25.1, 25.2, 25.3]);
}

#[test]
fn test_no_compensation_in_calibrate() {
    let mut f = fixture();
    bring_up(&mut f);
    f.state.set_peripheral_mode("ec-1", PeripheralMode::Calibrate);
    set_temperature(&f.state, 25.0);
    f.manager.step();
    assert!(f.hardware.compensation_writes().is_empty());
}

// ==================== 健康度 ====================

#[test]
fn test_every_read_failing_reaches_poor() {
    let mut f = fixture();
    bring_up(&mut f);
    f.hardware.set_fail_reads(true);
    for _ in 0..5 {
        f.manager.step();
    }
    assert_eq!(f.manager.health(), Health::Poor);
    assert_eq!(f.state.peripheral_health("ec-1"), Some(Health::Poor));
    // 默认不升级为 ERROR
    assert_eq!(f.manager.mode(), PeripheralMode::Normal);
}

#[test]
fn test_every_read_succeeding_reaches_good() {
    let mut f = fixture();
    bring_up(&mut f);
    for _ in 0..4 {
        f.manager.step();
    }
    assert_eq!(f.manager.health(), Health::Unknown);
    f.manager.step();
    assert_eq!(f.state.peripheral_health("ec-1"), Some(Health::Good));
}

#[test]
fn test_poor_health_escalates_when_configured() {
    let config = ec_config().with_health(HealthConfig {
        minimum_samples: 3,
        update_interval: 1,
        failure_threshold: 0.5,
        escalate_poor: true,
    });
    let mut f = fixture_with(config, "2.0");
    bring_up(&mut f);
    f.hardware.set_fail_reads(true);
    for _ in 0..3 {
        f.manager.step();
    }
    assert_eq!(f.manager.mode(), PeripheralMode::Error);
}

/// 读数期间模拟一条并发的 RESET 命令
struct ResetDuringRead {
    inner: SimulatedDriver,
    state: Arc<SharedState>,
    armed: Arc<AtomicBool>,
}

impl PeripheralDriver for ResetDuringRead {
    fn probe(&mut self) -> Result<(), DriverError> {
        self.inner.probe()
    }

    fn read_identity(&mut self) -> Result<Identity, DriverError> {
        self.inner.read_identity()
    }

    fn read_value(&mut self, channel: &str) -> Result<f64, DriverError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.state.set_peripheral_mode("ec-1", PeripheralMode::Reset);
        }
        self.inner.read_value(channel)
    }

    fn write_compensation(&mut self, value: f64) -> Result<(), DriverError> {
        self.inner.write_compensation(value)
    }

    fn configure(&mut self, option: &ConfigOption) -> Result<(), DriverError> {
        self.inner.configure(option)
    }

    fn quiesce(&mut self) -> Result<(), DriverError> {
        self.inner.quiesce()
    }
}

#[test]
fn test_escalation_yields_to_concurrent_reset() {
    let config = ec_config().with_health(HealthConfig {
        minimum_samples: 3,
        update_interval: 1,
        failure_threshold: 0.5,
        escalate_poor: true,
    });
    let state = Arc::new(SharedState::new());
    let inner = SimulatedDriver::new("EC", "2.0");
    let hardware = inner.handle();
    let armed = Arc::new(AtomicBool::new(false));
    let driver = ResetDuringRead {
        inner,
        state: state.clone(),
        armed: armed.clone(),
    };
    let mut manager = PeripheralManager::new(config, driver, state.clone()).unwrap();
    manager.step();
    manager.step();
    assert_eq!(manager.mode(), PeripheralMode::Normal);

    hardware.set_fail_reads(true);
    manager.step();
    manager.step();
    armed.store(true, Ordering::SeqCst);
    manager.step();

    // 健康度变为 POOR，但 RESET 命令先写入，升级不覆盖它
    assert_eq!(manager.health(), Health::Poor);
    assert_eq!(state.peripheral_mode("ec-1"), Some(PeripheralMode::Reset));

    hardware.set_fail_reads(false);
    assert_eq!(manager.step(), Step::Transition);
    assert_eq!(manager.mode(), PeripheralMode::Normal);
}

// ==================== 复位与关闭 ====================

#[test]
fn test_reset_clears_reported_values() {
    let mut f = fixture();
    bring_up(&mut f);
    set_temperature(&f.state, 20.0);
    f.manager.step();
    assert_eq!(env_ec(&f.state), Some(1.0));

    f.state.set_peripheral_mode("ec-1", PeripheralMode::Reset);
    f.hardware.set_fail_reads(true);
    assert_eq!(f.manager.step(), Step::Transition);
    assert_eq!(f.manager.mode(), PeripheralMode::Normal);
    assert_eq!(env_ec(&f.state), None);
    assert_eq!(f.state.peripheral_reported("ec-1", EC_VARIABLE), None);
    assert_eq!(f.manager.last_reading(EC_VARIABLE), None);
    assert_eq!(f.manager.total_reading_count(), 0);
    assert_eq!(f.state.peripheral_health("ec-1"), Some(Health::Unknown));

    // 读数失败期间保持无值
    f.manager.step();
    assert_eq!(env_ec(&f.state), None);

    // 下一次成功读数重新出现，补偿值重新写入
    f.hardware.set_fail_reads(false);
    f.manager.step();
    assert_eq!(env_ec(&f.state), Some(1.0));
    assert_eq!(f.hardware.compensation_writes(), vec![20.0, 20.0]);
}

#[test]
fn test_reset_recovers_from_error() {
    let mut f = fixture();
    f.hardware.set_fail_probe(true);
    f.manager.step();
    assert_eq!(f.manager.mode(), PeripheralMode::Error);

    f.hardware.set_fail_probe(false);
    f.state.set_peripheral_mode("ec-1", PeripheralMode::Reset);
    f.manager.step();
    assert_eq!(f.manager.mode(), PeripheralMode::Normal);
}

#[test]
fn test_reset_failure_enters_error() {
    let mut f = fixture();
    bring_up(&mut f);
    f.hardware.set_fail_probe(true);
    f.state.set_peripheral_mode("ec-1", PeripheralMode::Reset);
    f.manager.step();
    assert_eq!(f.manager.mode(), PeripheralMode::Error);
}

#[test]
fn test_shutdown_quiesces_and_terminates() {
    let mut f = fixture();
    bring_up(&mut f);
    f.manager.step();
    f.state.set_peripheral_mode("ec-1", PeripheralMode::Shutdown);
    assert_eq!(f.manager.step(), Step::Terminated);
    assert!(f.hardware.is_quiesced());
    assert_eq!(env_ec(&f.state), None);
    assert_eq!(f.manager.mode(), PeripheralMode::Shutdown);
    // 终态：不再访问硬件
    let reads = f.hardware.read_count();
    assert_eq!(f.manager.step(), Step::Terminated);
    assert_eq!(f.hardware.read_count(), reads);
}

#[test]
fn test_shutdown_failure_enters_error() {
    let mut f = fixture();
    bring_up(&mut f);
    f.hardware.set_fail_quiesce(true);
    f.state.set_peripheral_mode("ec-1", PeripheralMode::Shutdown);
    assert_eq!(f.manager.step(), Step::Idle);
    assert_eq!(f.manager.mode(), PeripheralMode::Error);
}

// ==================== 执行器 ====================

#[test]
fn test_actuator_publishes_to_actuator_map() {
    let state = Arc::new(SharedState::new());
    let config = PeripheralConfig::new("led-1", PeripheralKind::Actuator, "LED")
        .with_variable("ppfd", "light_ppfd_umol_m2_s");
    let driver = SimulatedDriver::new("LED", "1.0");
    driver.handle().set_value("ppfd", 420.0);
    let mut manager = PeripheralManager::new(config, driver, state.clone()).unwrap();
    manager.step();
    manager.step();
    manager.step();

    assert_eq!(
        state.environment_value(PeripheralKind::Actuator, ValueView::Reported, "light_ppfd_umol_m2_s"),
        Some(420.0)
    );
    assert_eq!(
        state.environment_value(PeripheralKind::Sensor, ValueView::Reported, "light_ppfd_umol_m2_s"),
        None
    );
}

// ==================== 轮询线程 ====================

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_runner_polls_and_shuts_down() {
    let config = ec_config().with_poll_interval(Duration::from_millis(10));
    let f = fixture_with(config, "2.0");
    let state = f.state.clone();
    let runner = PeripheralRunner::spawn(f.manager).unwrap();

    assert!(wait_for(Duration::from_secs(2), || env_ec(&state) == Some(1.0)));
    assert!(wait_for(Duration::from_secs(2), || runner.status().total_reading_count >= 3));

    state.set_peripheral_mode("ec-1", PeripheralMode::Shutdown);
    assert!(wait_for(Duration::from_secs(2), || runner.is_finished()));
    assert!(f.hardware.is_quiesced());
    assert_eq!(runner.status().mode, PeripheralMode::Shutdown);
}

#[test]
fn test_runner_drop_stops_thread() {
    let config = ec_config().with_poll_interval(Duration::from_secs(60));
    let f = fixture_with(config, "2.0");
    let state = f.state.clone();
    let runner = PeripheralRunner::spawn(f.manager).unwrap();
    assert!(wait_for(Duration::from_secs(2), || env_ec(&state).is_some()));

    let start = Instant::now();
    drop(runner);
    assert!(start.elapsed() < Duration::from_secs(1));
}
