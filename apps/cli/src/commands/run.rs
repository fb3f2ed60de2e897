//! run 命令
//!
//! 按配置启动设备（无硬件驱动时使用模拟驱动），可选执行命令脚本，
//! 周期性打印模式快照，直到 Ctrl+C 或到达运行时长。

use anyhow::{Context, Result};
use clap::Args;
use sprout_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::script::ScriptExecutor;

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 设备配置文件路径（TOML）
    #[arg(short, long)]
    pub config: String,

    /// 启动后执行的命令脚本（JSON）
    #[arg(short, long)]
    pub script: Option<String>,

    /// 状态打印间隔（毫秒）
    #[arg(long, default_value_t = 2000)]
    pub status_interval_ms: u64,

    /// 运行时长（秒），缺省运行到 Ctrl+C
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// 脚本步骤失败时继续执行
    #[arg(long)]
    pub continue_on_error: bool,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let config = DeviceConfig::load(&self.config)
            .with_context(|| format!("配置文件无效: {}", self.config))?;
        let device = Device::builder().config(config).build().context("设备启动失败")?;
        println!("🌱 设备已启动: {} 个外设", device.peripheral_status().len());

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
        })
        .context("注册 Ctrl+C 处理器失败")?;

        if let Some(path) = &self.script {
            let script = ScriptExecutor::load_script(path)?;
            println!("📜 脚本: {} ({} 个步骤)", script.name, script.steps.len());
            let result = ScriptExecutor::new(device.mediator())
                .continue_on_error(self.continue_on_error)
                .execute(&script);
            println!(
                "📊 成功 {}/{}，失败 {}，耗时 {:.2} 秒",
                result.succeeded.len(),
                result.total_steps,
                result.failed.len(),
                result.duration_secs
            );
        }

        let deadline = self.duration_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        let interval = Duration::from_millis(self.status_interval_ms.max(100));
        let mut next_print = Instant::now();

        while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
            if Instant::now() >= next_print {
                print_status(&device);
                next_print += interval;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        println!("⏹  正在关闭设备...");
        device.shutdown(Duration::from_secs(5));
        Ok(())
    }
}

fn print_status(device: &Device) {
    let snapshot = device.mode_snapshot();
    println!(
        "设备: {}  配方: {}",
        snapshot.device.unwrap_or_default(),
        snapshot.recipe.unwrap_or_default()
    );
    for status in device.peripheral_status() {
        println!(
            "  {:<12} {:<10} {:<8} 失败 {}/{}",
            status.name,
            status.mode.as_str(),
            status.health.to_string(),
            status.missed_reading_count,
            status.total_reading_count
        );
    }
}
