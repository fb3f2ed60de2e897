//! validate 命令
//!
//! 加载并校验设备配置文件

use anyhow::{Context, Result};
use clap::Args;
use sprout_sdk::DeviceConfig;

/// 配置校验命令参数
#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// 设备配置文件路径（TOML）
    #[arg(short, long)]
    pub config: String,
}

impl ValidateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = DeviceConfig::load(&self.config)
            .with_context(|| format!("配置文件无效: {}", self.config))?;

        println!("✅ 配置有效: {}", self.config);
        println!(
            "  中介: 超时 {} ms, 队列容量 {}",
            config.mediator.timeout_ms, config.mediator.queue_capacity
        );
        println!("  {} 个外设", config.peripherals.len());
        for peripheral in &config.peripherals {
            let variables: Vec<&str> =
                peripheral.variables.iter().map(|v| v.variable.as_str()).collect();
            println!(
                "  - {} ({}, {}): {} ms, 变量 [{}]{}",
                peripheral.name,
                peripheral.kind,
                peripheral.expected_device_type,
                peripheral.poll_interval_ms,
                variables.join(", "),
                if peripheral.simulation.is_some() { ", 模拟" } else { "" }
            );
        }
        Ok(())
    }
}
