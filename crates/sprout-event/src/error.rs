//! 事件层错误类型定义

use thiserror::Error;

/// 调用方请求格式错误（映射为 400，不会进入控制线程）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// 请求不是 JSON 对象
    #[error("Request must be a JSON object")]
    NotAnObject,

    /// 缺少必需字段
    #[error("Request does not contain `{0}`")]
    MissingField(&'static str),

    /// START_RECIPE 缺少配方标识
    #[error("Request does not contain `uuid` (or `recipe_id`)")]
    MissingRecipeId,

    /// 字段类型或取值不合法
    #[error("Invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// 未知请求类型
    #[error("Unknown request type `{0}`")]
    UnknownType(String),
}

/// 持久化边界错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    /// 配方 JSON 无法解析出 `uuid`/`name`
    #[error("Invalid recipe json: {0}")]
    InvalidJson(String),

    /// 同一 uuid 的配方已存在
    #[error("Recipe `{0}` already exists")]
    Duplicate(String),

    /// 存储后端错误
    #[error("Recipe storage error: {0}")]
    Storage(String),
}
