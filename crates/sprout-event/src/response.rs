//! 事件响应

use serde::{Deserialize, Serialize};
use std::fmt;

/// 成功
pub const STATUS_OK: u16 = 200;
/// 请求格式错误或当前状态不允许
pub const STATUS_BAD_REQUEST: u16 = 400;
/// 目标（外设、配方）不存在
pub const STATUS_NOT_FOUND: u16 = 404;
/// 持久化后端错误
pub const STATUS_INTERNAL_ERROR: u16 = 500;
/// 控制线程已退出
pub const STATUS_UNAVAILABLE: u16 = 503;
/// 等待响应超时（命令仍可能被执行）
pub const STATUS_TIMEOUT: u16 = 504;

/// 结构化响应，调用方总会收到一个
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub message: String,
    pub status: u16,
}

impl EventResponse {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(STATUS_OK, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(STATUS_BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(STATUS_NOT_FOUND, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(STATUS_INTERNAL_ERROR, message)
    }

    pub fn unavailable() -> Self {
        Self::new(STATUS_UNAVAILABLE, "Control thread is not running")
    }

    pub fn timeout() -> Self {
        Self::new(STATUS_TIMEOUT, "Timed out waiting for control thread response")
    }

    /// 状态码是否属于 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Display for EventResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}
