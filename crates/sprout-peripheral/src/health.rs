//! 健康度统计
//!
//! 记录每个轮询周期的读数成败，在最近 `minimum_samples` 个样本上计算失败率，
//! 每 `update_interval` 次更新重新分类一次。
//!
//! 健康度只是信息：是否把 POOR 升级为 ERROR 由管理器按 `escalate_poor` 决定。

use serde::{Deserialize, Serialize};
use sprout_state::Health;
use std::collections::VecDeque;

/// 健康度配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// 参与计算的最近样本数
    pub minimum_samples: usize,
    /// 每多少次更新重新分类一次（计数，不是时间）
    pub update_interval: usize,
    /// 失败率阈值：低于为 GOOD，达到或超过为 POOR
    pub failure_threshold: f64,
    /// POOR 时是否把外设升级为 ERROR
    pub escalate_poor: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            minimum_samples: 60,
            update_interval: 5,
            failure_threshold: 0.2,
            escalate_poor: false,
        }
    }
}

impl HealthConfig {
    /// 校验配置，返回第一条违规说明
    pub fn validate(&self) -> Result<(), String> {
        if self.minimum_samples == 0 {
            return Err("health.minimum_samples must be >= 1".to_string());
        }
        if self.update_interval == 0 {
            return Err("health.update_interval must be >= 1".to_string());
        }
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err(format!(
                "health.failure_threshold must be in (0, 1], got {}",
                self.failure_threshold
            ));
        }
        Ok(())
    }
}

/// 健康度统计器
///
/// # 示例
///
/// ```
/// use sprout_peripheral::{HealthConfig, HealthTracker};
/// use sprout_state::Health;
///
/// let mut tracker = HealthTracker::new(HealthConfig {
///     minimum_samples: 3,
///     update_interval: 1,
///     ..HealthConfig::default()
/// });
/// tracker.record(true);
/// tracker.record(true);
/// assert_eq!(tracker.health(), Health::Unknown);
/// assert_eq!(tracker.record(true), Health::Good);
/// ```
#[derive(Debug, Clone)]
pub struct HealthTracker {
    config: HealthConfig,
    /// 最近样本窗口（true 表示读数失败）
    window: VecDeque<bool>,
    missed_reading_count: u64,
    total_reading_count: u64,
    updates_since_classify: usize,
    health: Health,
}

impl HealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        let capacity = config.minimum_samples;
        Self {
            config,
            window: VecDeque::with_capacity(capacity),
            missed_reading_count: 0,
            total_reading_count: 0,
            updates_since_classify: 0,
            health: Health::Unknown,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// 记录一次轮询结果，返回当前分类
    pub fn record(&mut self, success: bool) -> Health {
        if !success {
            self.missed_reading_count += 1;
        }
        self.total_reading_count += 1;

        let was_full = self.window.len() >= self.config.minimum_samples;
        if was_full {
            self.window.pop_front();
        }
        self.window.push_back(!success);

        self.updates_since_classify += 1;
        let just_filled = !was_full && self.window.len() == self.config.minimum_samples;
        if just_filled || self.updates_since_classify >= self.config.update_interval {
            self.updates_since_classify = 0;
            self.health = self.classify();
        }
        self.health
    }

    fn classify(&self) -> Health {
        match self.failure_ratio() {
            None => Health::Unknown,
            Some(ratio) if ratio < self.config.failure_threshold => Health::Good,
            Some(_) => Health::Poor,
        }
    }

    /// 窗口内失败率（样本不足时为 `None`）
    pub fn failure_ratio(&self) -> Option<f64> {
        if self.window.len() < self.config.minimum_samples {
            return None;
        }
        let missed = self.window.iter().filter(|missed| **missed).count();
        Some(missed as f64 / self.window.len() as f64)
    }

    pub fn health(&self) -> Health {
        self.health
    }

    /// 累计失败次数
    pub fn missed_reading_count(&self) -> u64 {
        self.missed_reading_count
    }

    /// 累计轮询次数
    pub fn total_reading_count(&self) -> u64 {
        self.total_reading_count
    }

    /// 清空全部统计（复位时调用）
    pub fn reset(&mut self) {
        self.window.clear();
        self.missed_reading_count = 0;
        self.total_reading_count = 0;
        self.updates_since_classify = 0;
        self.health = Health::Unknown;
    }
}
