//! 脚本系统
//!
//! JSON 命令脚本：按顺序把事件请求提交给运行中的设备。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sprout_sdk::sprout_event::{EventMediator, EventResponse};
use std::fs;
use std::time::{Duration, Instant};

/// 脚本命令序列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// 脚本名称
    pub name: String,

    /// 脚本描述
    #[serde(default)]
    pub description: String,

    /// 步骤序列
    pub steps: Vec<ScriptStep>,
}

/// 脚本步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    /// 提交前等待（毫秒）
    #[serde(default)]
    pub wait_ms: u64,

    /// 原样提交的事件请求（`{"type": ..., ...}`）
    pub request: Value,
}

/// 执行结果
#[derive(Debug, Default)]
pub struct ScriptResult {
    pub total_steps: usize,
    pub succeeded: Vec<usize>,
    pub failed: Vec<(usize, EventResponse)>,
    pub duration_secs: f64,
}

/// 脚本执行器
pub struct ScriptExecutor {
    mediator: EventMediator,
    continue_on_error: bool,
}

impl ScriptExecutor {
    pub fn new(mediator: EventMediator) -> Self {
        Self {
            mediator,
            continue_on_error: false,
        }
    }

    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// 加载脚本文件
    pub fn load_script(path: &str) -> Result<Script> {
        let content = fs::read_to_string(path).context("读取脚本文件失败")?;
        let script: Script = serde_json::from_str(&content).context("解析脚本文件失败")?;
        Ok(script)
    }

    /// 执行脚本
    pub fn execute(&self, script: &Script) -> ScriptResult {
        let start = Instant::now();
        let mut result = ScriptResult {
            total_steps: script.steps.len(),
            ..ScriptResult::default()
        };

        for (idx, step) in script.steps.iter().enumerate() {
            if step.wait_ms > 0 {
                std::thread::sleep(Duration::from_millis(step.wait_ms));
            }

            let response = self.mediator.submit_json(&step.request);
            println!("  [{}] {}", idx + 1, response);

            if response.is_success() {
                result.succeeded.push(idx);
            } else {
                result.failed.push((idx, response));
                if !self.continue_on_error {
                    break;
                }
            }
        }

        result.duration_secs = start.elapsed().as_secs_f64();
        result
    }
}
