//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 安装全局 `tracing` 订阅者，并把 `log` 记录桥接到 `tracing`
///
/// 过滤规则优先取 `RUST_LOG`，未设置时使用 `default_directive`（如 `"sprout=info"`）。
/// 已经安装过订阅者时不做任何事并返回 `false`。
pub fn init_logging(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // 依赖 `log` 的第三方库
    let _ = tracing_log::LogTracer::init();
    true
}
