//! 共享状态键名常量
//!
//! `device`/`recipe` 分区使用扁平键；外设分区使用 [`MODE`] 与 [`HEALTH`]。

/// 模式字段（device、recipe、外设通用）
pub const MODE: &str = "mode";
/// 外设健康分类字段
pub const HEALTH: &str = "health";

// === recipe 分区 ===
pub const RECIPE_NAME: &str = "recipe_name";
pub const RECIPE_UUID: &str = "recipe_uuid";
/// 配方开始时间（UNIX 分钟）
pub const START_TIME: &str = "start_time";
pub const PERCENT_COMPLETE: &str = "percent_complete";
pub const ELAPSED_TIME: &str = "elapsed_time";
pub const ELAPSED_MINUTES: &str = "elapsed_minutes";
pub const REMAINING_TIME: &str = "remaining_time";
pub const REMAINING_MINUTES: &str = "remaining_minutes";
pub const CURRENT_PHASE: &str = "current_phase";
pub const CURRENT_CYCLE: &str = "current_cycle";
pub const CURRENT_ENVIRONMENT_NAME: &str = "current_environment_name";

/// 配方进度字段（停止配方时全部清除）
pub const RECIPE_PROGRESS: [&str; 11] = [
    RECIPE_NAME,
    RECIPE_UUID,
    START_TIME,
    PERCENT_COMPLETE,
    ELAPSED_TIME,
    ELAPSED_MINUTES,
    REMAINING_TIME,
    REMAINING_MINUTES,
    CURRENT_PHASE,
    CURRENT_CYCLE,
    CURRENT_ENVIRONMENT_NAME,
];
