//! 共享状态存储
//!
//! 进程内唯一的共享可变资源。每个顶层分区持有一把独立的 `RwLock`，
//! 同一 (section, key) 的读写因此被串行化；不同分区之间互不阻塞。
//!
//! **临界区约束**：锁内只做 `HashMap` 操作和 `Value` 克隆，从不执行 IO。

use crate::error::StateError;
use crate::keys;
use crate::mode::{DeviceMode, Health, PeripheralKind, PeripheralMode, RecipeMode, ValueView};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

type Fields = HashMap<String, Value>;

/// 状态分区
///
/// `Peripheral` 与 `PeripheralReported` 以外设名称作为子分区。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section<'a> {
    /// 设备级标量字段
    Device,
    /// 配方级标量字段
    Recipe,
    /// 环境变量（按外设类型与视图划分）
    Environment { kind: PeripheralKind, view: ValueView },
    /// 外设的 `mode`/`health` 字段
    Peripheral(&'a str),
    /// 外设自己的最新读数（校准模式下读数只写到这里）
    PeripheralReported(&'a str),
}

impl fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Device => f.write_str("device"),
            Section::Recipe => f.write_str("recipe"),
            Section::Environment { kind, view } => write!(f, "environment.{}.{}", kind, view),
            Section::Peripheral(name) => write!(f, "peripherals.{}", name),
            Section::PeripheralReported(name) => write!(f, "peripherals.{}.reported", name),
        }
    }
}

#[derive(Debug, Default)]
struct EnvironmentMaps {
    reported: Fields,
    desired: Fields,
}

#[derive(Debug, Default)]
struct EnvironmentState {
    sensor: EnvironmentMaps,
    actuator: EnvironmentMaps,
}

impl EnvironmentState {
    fn fields(&self, kind: PeripheralKind, view: ValueView) -> &Fields {
        let maps = match kind {
            PeripheralKind::Sensor => &self.sensor,
            PeripheralKind::Actuator => &self.actuator,
        };
        match view {
            ValueView::Reported => &maps.reported,
            ValueView::Desired => &maps.desired,
        }
    }

    fn fields_mut(&mut self, kind: PeripheralKind, view: ValueView) -> &mut Fields {
        let maps = match kind {
            PeripheralKind::Sensor => &mut self.sensor,
            PeripheralKind::Actuator => &mut self.actuator,
        };
        match view {
            ValueView::Reported => &mut maps.reported,
            ValueView::Desired => &mut maps.desired,
        }
    }
}

#[derive(Debug, Default)]
struct PeripheralRecord {
    fields: Fields,
    reported: Fields,
}

/// 单个外设的模式/健康快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeripheralSnapshot {
    pub mode: Option<PeripheralMode>,
    pub health: Option<Health>,
}

/// 设备、配方与全部外设的模式快照（用于展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeSnapshot {
    pub device: Option<DeviceMode>,
    pub recipe: Option<RecipeMode>,
    pub peripherals: BTreeMap<String, PeripheralSnapshot>,
}

/// 共享状态存储
///
/// 以 `Arc<SharedState>` 注入各组件使用。
///
/// # 示例
///
/// ```
/// use sprout_state::{PeripheralKind, SharedState, ValueView};
///
/// let state = SharedState::new();
/// state.set_environment_value(PeripheralKind::Sensor, ValueView::Reported, "temperature_celsius", 21.5);
/// assert_eq!(
///     state.environment_value(PeripheralKind::Sensor, ValueView::Reported, "temperature_celsius"),
///     Some(21.5)
/// );
/// ```
#[derive(Debug, Default)]
pub struct SharedState {
    device: RwLock<Fields>,
    recipe: RwLock<Fields>,
    environment: RwLock<EnvironmentState>,
    peripherals: RwLock<HashMap<String, PeripheralRecord>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_fields<R>(&self, section: Section<'_>, f: impl FnOnce(Option<&Fields>) -> R) -> R {
        match section {
            Section::Device => f(Some(&*self.device.read())),
            Section::Recipe => f(Some(&*self.recipe.read())),
            Section::Environment { kind, view } => f(Some(self.environment.read().fields(kind, view))),
            Section::Peripheral(name) => f(self.peripherals.read().get(name).map(|r| &r.fields)),
            Section::PeripheralReported(name) => {
                f(self.peripherals.read().get(name).map(|r| &r.reported))
            },
        }
    }

    fn write_fields<R>(&self, section: Section<'_>, f: impl FnOnce(&mut Fields) -> R) -> R {
        match section {
            Section::Device => f(&mut *self.device.write()),
            Section::Recipe => f(&mut *self.recipe.write()),
            Section::Environment { kind, view } => f(self.environment.write().fields_mut(kind, view)),
            Section::Peripheral(name) => {
                let mut peripherals = self.peripherals.write();
                f(&mut peripherals.entry(name.to_string()).or_default().fields)
            },
            Section::PeripheralReported(name) => {
                let mut peripherals = self.peripherals.write();
                f(&mut peripherals.entry(name.to_string()).or_default().reported)
            },
        }
    }

    /// 读取单个键，缺失返回 `None`
    pub fn get(&self, section: Section<'_>, key: &str) -> Option<Value> {
        self.read_fields(section, |fields| fields.and_then(|f| f.get(key).cloned()))
    }

    /// 写入单个键（覆盖旧值）
    pub fn set(&self, section: Section<'_>, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.write_fields(section, |fields| {
            fields.insert(key.to_string(), value);
        });
    }

    /// 删除单个键，返回旧值
    pub fn remove(&self, section: Section<'_>, key: &str) -> Option<Value> {
        self.write_fields(section, |fields| fields.remove(key))
    }

    /// 读取并解码单个键
    ///
    /// # 错误
    /// - `StateError::Decode`: 存储的值与 `T` 不匹配
    pub fn get_as<T: DeserializeOwned>(
        &self,
        section: Section<'_>,
        key: &str,
    ) -> Result<Option<T>, StateError> {
        match self.get(section, key) {
            None => Ok(None),
            Some(value) => {
                serde_json::from_value(value).map(Some).map_err(|source| StateError::Decode {
                    section: section.to_string(),
                    key: key.to_string(),
                    source,
                })
            },
        }
    }

    /// 在同一把锁内比较并替换单个键
    ///
    /// `accept` 返回 true 时写入 `new` 并返回旧值；否则不修改，返回当前值。
    pub fn compare_and_set(
        &self,
        section: Section<'_>,
        key: &str,
        accept: impl FnOnce(Option<&Value>) -> bool,
        new: impl Into<Value>,
    ) -> Result<Option<Value>, Option<Value>> {
        let new = new.into();
        self.write_fields(section, |fields| {
            let current = fields.get(key);
            if accept(current) {
                Ok(fields.insert(key.to_string(), new))
            } else {
                Err(current.cloned())
            }
        })
    }

    /// 分区内全部键值的有序快照
    pub fn section_snapshot(&self, section: Section<'_>) -> BTreeMap<String, Value> {
        self.read_fields(section, |fields| {
            fields
                .map(|f| f.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default()
        })
    }

    /// 解码失败时记录警告并视为无值
    fn get_lossy<T: DeserializeOwned>(&self, section: Section<'_>, key: &str) -> Option<T> {
        match self.get_as(section, key) {
            Ok(value) => value,
            Err(e) => {
                warn!("{}", e);
                None
            },
        }
    }

    // ==================== device / recipe ====================

    pub fn device_mode(&self) -> Option<DeviceMode> {
        self.get_lossy(Section::Device, keys::MODE)
    }

    pub fn set_device_mode(&self, mode: DeviceMode) {
        self.set(Section::Device, keys::MODE, to_value(mode));
    }

    pub fn recipe_mode(&self) -> Option<RecipeMode> {
        self.get_lossy(Section::Recipe, keys::MODE)
    }

    pub fn set_recipe_mode(&self, mode: RecipeMode) {
        self.set(Section::Recipe, keys::MODE, to_value(mode));
    }

    // ==================== environment ====================

    /// 读取环境变量数值（缺失或非数值均返回 `None`）
    pub fn environment_value(
        &self,
        kind: PeripheralKind,
        view: ValueView,
        variable: &str,
    ) -> Option<f64> {
        self.get(Section::Environment { kind, view }, variable).and_then(|v| v.as_f64())
    }

    pub fn set_environment_value(
        &self,
        kind: PeripheralKind,
        view: ValueView,
        variable: &str,
        value: f64,
    ) {
        self.set(Section::Environment { kind, view }, variable, value);
    }

    pub fn clear_environment_value(&self, kind: PeripheralKind, view: ValueView, variable: &str) {
        self.remove(Section::Environment { kind, view }, variable);
    }

    // ==================== peripherals ====================

    /// 注册外设（初始模式 INIT，健康 UNKNOWN）
    pub fn register_peripheral(&self, name: &str) {
        let mut peripherals = self.peripherals.write();
        let record = peripherals.entry(name.to_string()).or_default();
        record.fields.insert(keys::MODE.to_string(), to_value(PeripheralMode::Init));
        record.fields.insert(keys::HEALTH.to_string(), to_value(Health::Unknown));
    }

    pub fn has_peripheral(&self, name: &str) -> bool {
        self.peripherals.read().contains_key(name)
    }

    pub fn peripheral_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.peripherals.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn peripheral_mode(&self, name: &str) -> Option<PeripheralMode> {
        self.get_lossy(Section::Peripheral(name), keys::MODE)
    }

    pub fn set_peripheral_mode(&self, name: &str, mode: PeripheralMode) {
        self.set(Section::Peripheral(name), keys::MODE, to_value(mode));
    }

    /// 原子模式转换：仅当当前模式属于 `allowed` 时写入 `next`
    ///
    /// 成功返回转换前的模式；失败返回当前模式（可能不存在）。
    pub fn transition_peripheral_mode(
        &self,
        name: &str,
        allowed: &[PeripheralMode],
        next: PeripheralMode,
    ) -> Result<PeripheralMode, Option<PeripheralMode>> {
        let decode = |value: Option<&Value>| -> Option<PeripheralMode> {
            value.and_then(|v| serde_json::from_value(v.clone()).ok())
        };
        self.compare_and_set(
            Section::Peripheral(name),
            keys::MODE,
            |current| decode(current).is_some_and(|mode| allowed.contains(&mode)),
            to_value(next),
        )
        .map(|previous| decode(previous.as_ref()).unwrap_or_default())
        .map_err(|current| decode(current.as_ref()))
    }

    pub fn peripheral_health(&self, name: &str) -> Option<Health> {
        self.get_lossy(Section::Peripheral(name), keys::HEALTH)
    }

    pub fn set_peripheral_health(&self, name: &str, health: Health) {
        self.set(Section::Peripheral(name), keys::HEALTH, to_value(health));
    }

    pub fn peripheral_reported(&self, name: &str, variable: &str) -> Option<f64> {
        self.get(Section::PeripheralReported(name), variable).and_then(|v| v.as_f64())
    }

    pub fn set_peripheral_reported(&self, name: &str, variable: &str, value: f64) {
        self.set(Section::PeripheralReported(name), variable, value);
    }

    pub fn clear_peripheral_reported(&self, name: &str, variable: &str) {
        self.remove(Section::PeripheralReported(name), variable);
    }

    /// 设备、配方与全部外设的模式/健康快照
    pub fn mode_snapshot(&self) -> ModeSnapshot {
        let peripherals = self
            .peripheral_names()
            .into_iter()
            .map(|name| {
                let snapshot = PeripheralSnapshot {
                    mode: self.peripheral_mode(&name),
                    health: self.peripheral_health(&name),
                };
                (name, snapshot)
            })
            .collect();
        ModeSnapshot {
            device: self.device_mode(),
            recipe: self.recipe_mode(),
            peripherals,
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Value {
    // 本模块内的枚举均为单元变体，序列化不会失败
    serde_json::to_value(value).unwrap_or(Value::Null)
}
