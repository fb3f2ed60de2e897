//! # Sprout CLI
//!
//! Command-line interface for Sprout cultivation devices.
//!
//! ```bash
//! # 校验设备配置
//! sprout-cli validate --config device.toml
//!
//! # 运行设备（未接硬件的外设使用模拟驱动），执行命令脚本后持续打印状态
//! sprout-cli run --config device.toml --script calibrate.json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod script;

use commands::{RunCommand, ValidateCommand};

/// Sprout CLI - 栽培设备命令行工具
#[derive(Parser, Debug)]
#[command(name = "sprout-cli")]
#[command(about = "Command-line interface for Sprout cultivation devices", long_about = None)]
#[command(version)]
struct Cli {
    /// 默认日志过滤规则（`RUST_LOG` 优先）
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 校验设备配置文件
    Validate {
        #[command(flatten)]
        args: ValidateCommand,
    },

    /// 运行设备
    Run {
        #[command(flatten)]
        args: RunCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    sprout_sdk::init_logging(&cli.log);

    match cli.command {
        Commands::Validate { args } => args.execute(),
        Commands::Run { args } => args.execute(),
    }
}
