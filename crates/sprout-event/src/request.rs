//! 事件请求类型与 JSON 解析
//!
//! 外部调用方以 `{"type": "...", ...}` 形式提交请求。解析在调用方线程完成：
//! 格式错误或未知类型直接返回 400，不进入控制线程。

use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sprout_state::PeripheralMode;
use std::fmt;
use std::str::FromStr;

/// 外设命令（由控制线程以比较替换写入外设模式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeripheralCommand {
    EnterCalibration,
    ExitCalibration,
    Reset,
    Shutdown,
}

impl PeripheralCommand {
    pub const ALL: [PeripheralCommand; 4] = [
        PeripheralCommand::EnterCalibration,
        PeripheralCommand::ExitCalibration,
        PeripheralCommand::Reset,
        PeripheralCommand::Shutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeripheralCommand::EnterCalibration => "ENTER_CALIBRATION",
            PeripheralCommand::ExitCalibration => "EXIT_CALIBRATION",
            PeripheralCommand::Reset => "RESET",
            PeripheralCommand::Shutdown => "SHUTDOWN",
        }
    }

    /// 允许执行该命令的源模式
    pub fn allowed_from(&self) -> &'static [PeripheralMode] {
        use PeripheralMode::*;
        match self {
            PeripheralCommand::EnterCalibration => &[Normal],
            PeripheralCommand::ExitCalibration => &[Calibrate],
            PeripheralCommand::Reset => &[Error, Normal, Calibrate],
            PeripheralCommand::Shutdown => &[Init, Setup, Normal, Calibrate, Error, Reset],
        }
    }

    /// 命令写入的目标模式
    pub fn target(&self) -> PeripheralMode {
        match self {
            PeripheralCommand::EnterCalibration => PeripheralMode::Calibrate,
            PeripheralCommand::ExitCalibration => PeripheralMode::Normal,
            PeripheralCommand::Reset => PeripheralMode::Reset,
            PeripheralCommand::Shutdown => PeripheralMode::Shutdown,
        }
    }
}

impl fmt::Display for PeripheralCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeripheralCommand {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PeripheralCommand::ALL
            .into_iter()
            .find(|command| command.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RequestError::InvalidField {
                field: "command",
                reason: format!("unknown peripheral command `{}`", s),
            })
    }
}

/// 事件请求（提交后不可变）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventRequest {
    /// 创建配方；`json` 为原样交给持久化边界的配方文本
    CreateRecipe { json: String },
    /// 启动配方；`start_timestamp_minutes` 缺省为当前时间（UNIX 分钟）
    StartRecipe {
        uuid: String,
        start_timestamp_minutes: Option<i64>,
    },
    StopRecipe,
    PeripheralCommand {
        peripheral: String,
        command: PeripheralCommand,
    },
}

impl EventRequest {
    pub fn create_recipe(json: impl Into<String>) -> Self {
        EventRequest::CreateRecipe { json: json.into() }
    }

    pub fn start_recipe(uuid: impl Into<String>, start_timestamp_minutes: Option<i64>) -> Self {
        EventRequest::StartRecipe {
            uuid: uuid.into(),
            start_timestamp_minutes,
        }
    }

    pub fn peripheral_command(peripheral: impl Into<String>, command: PeripheralCommand) -> Self {
        EventRequest::PeripheralCommand {
            peripheral: peripheral.into(),
            command,
        }
    }

    /// 请求类型名（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            EventRequest::CreateRecipe { .. } => "CREATE_RECIPE",
            EventRequest::StartRecipe { .. } => "START_RECIPE",
            EventRequest::StopRecipe => "STOP_RECIPE",
            EventRequest::PeripheralCommand { .. } => "PERIPHERAL_COMMAND",
        }
    }

    /// 从调用方提交的 JSON 对象解析请求
    ///
    /// `START_RECIPE` 的配方标识接受 `uuid` 或 `recipe_id`；
    /// `CREATE_RECIPE` 的 `json` 可以是字符串或对象。
    ///
    /// # 错误
    /// - `RequestError::MissingField`: 缺少 `type` 或该类型的必需字段
    /// - `RequestError::MissingRecipeId`: `START_RECIPE` 既无 `uuid` 也无 `recipe_id`
    /// - `RequestError::UnknownType`: 未知请求类型
    /// - `RequestError::InvalidField`: 字段类型不对
    ///
    /// # 示例
    ///
    /// ```
    /// use serde_json::json;
    /// use sprout_event::{EventRequest, RequestError};
    ///
    /// let request = EventRequest::from_json(&json!({"type": "STOP_RECIPE"})).unwrap();
    /// assert_eq!(request, EventRequest::StopRecipe);
    ///
    /// let err = EventRequest::from_json(&json!({"type": "CREATE_RECIPE"})).unwrap_err();
    /// assert_eq!(err, RequestError::MissingField("json"));
    /// ```
    pub fn from_json(value: &Value) -> Result<Self, RequestError> {
        let object = value.as_object().ok_or(RequestError::NotAnObject)?;
        let kind = required_str(object, "type")?;

        match kind {
            "CREATE_RECIPE" => {
                let json = match object.get("json") {
                    None | Some(Value::Null) => return Err(RequestError::MissingField("json")),
                    Some(Value::String(text)) => text.clone(),
                    Some(blob @ Value::Object(_)) => blob.to_string(),
                    Some(_) => {
                        return Err(RequestError::InvalidField {
                            field: "json",
                            reason: "expected a string or an object".to_string(),
                        });
                    },
                };
                Ok(EventRequest::CreateRecipe { json })
            },
            "START_RECIPE" => {
                let uuid = match (object.get("uuid"), object.get("recipe_id")) {
                    (Some(_), _) => required_str(object, "uuid")?,
                    (None, Some(_)) => required_str(object, "recipe_id")?,
                    (None, None) => return Err(RequestError::MissingRecipeId),
                };
                let start_timestamp_minutes = match object.get("start_timestamp_minutes") {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(value.as_i64().ok_or_else(|| RequestError::InvalidField {
                        field: "start_timestamp_minutes",
                        reason: format!("expected an integer, got {}", value),
                    })?),
                };
                Ok(EventRequest::StartRecipe {
                    uuid: uuid.to_string(),
                    start_timestamp_minutes,
                })
            },
            "STOP_RECIPE" => Ok(EventRequest::StopRecipe),
            "PERIPHERAL_COMMAND" => {
                let peripheral = required_str(object, "peripheral")?.to_string();
                let command: PeripheralCommand = required_str(object, "command")?.parse()?;
                Ok(EventRequest::PeripheralCommand {
                    peripheral,
                    command,
                })
            },
            other => Err(RequestError::UnknownType(other.to_string())),
        }
    }
}

fn required_str<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, RequestError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(RequestError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(RequestError::InvalidField {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}
