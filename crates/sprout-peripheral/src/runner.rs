//! 外设轮询线程
//!
//! 每个外设一个独立线程，按固定节拍执行 [`PeripheralManager::step`]。
//! 线程只会阻塞在驱动调用和自己的节拍休眠上，从不等待其他外设或控制线程。

use crate::driver::PeripheralDriver;
use crate::error::PeripheralError;
use crate::manager::{PeripheralManager, PeripheralStatus, Step};
use arc_swap::ArcSwap;
use sprout_state::JoinTimeout;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// 休眠切片：停止请求最迟在该时长内被响应
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// 外设轮询线程句柄
///
/// Drop 时通知线程退出并等待（最多 2 秒）。挂起在驱动调用中的线程不会被强制取消。
pub struct PeripheralRunner {
    name: String,
    is_running: Arc<AtomicBool>,
    status: Arc<ArcSwap<PeripheralStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl PeripheralRunner {
    /// 把管理器移动到新线程并开始轮询
    ///
    /// # 错误
    /// - `PeripheralError::ThreadSpawn`: 系统无法创建线程
    pub fn spawn<D>(manager: PeripheralManager<D>) -> Result<Self, PeripheralError>
    where
        D: PeripheralDriver + 'static,
    {
        let name = manager.name().to_string();
        let is_running = Arc::new(AtomicBool::new(true));
        let status = Arc::new(ArcSwap::from_pointee(manager.status()));

        let handle = std::thread::Builder::new()
            .name(format!("peripheral-{}", name))
            .spawn({
                let is_running = is_running.clone();
                let status = status.clone();
                move || poll_loop(manager, is_running, status)
            })?;

        info!(peripheral = %name, "Polling thread started");
        Ok(Self {
            name,
            is_running,
            status,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 最近一步之后的状态快照（无锁读取）
    pub fn status(&self) -> Arc<PeripheralStatus> {
        self.status.load_full()
    }

    /// 线程是否已退出（关闭完成或 panic）
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// 通知线程退出（不等待）
    pub fn request_stop(&self) {
        self.is_running.store(false, Ordering::Release);
    }
}

impl Drop for PeripheralRunner {
    fn drop(&mut self) {
        self.request_stop();

        let join_timeout = Duration::from_secs(2);
        if let Some(handle) = self.handle.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                peripheral = %self.name,
                "Polling thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}

fn poll_loop<D: PeripheralDriver>(
    mut manager: PeripheralManager<D>,
    is_running: Arc<AtomicBool>,
    status: Arc<ArcSwap<PeripheralStatus>>,
) {
    let interval = manager.config().poll_interval();

    while is_running.load(Ordering::Acquire) {
        let cycle_start = Instant::now();
        let step = manager.step();
        status.store(Arc::new(manager.status()));

        match step {
            Step::Transition => continue,
            Step::Terminated => {
                debug!(peripheral = %manager.name(), "Polling thread terminated after shutdown");
                break;
            },
            Step::Poll | Step::Idle => sleep_until(cycle_start + interval, &is_running),
        }
    }
}

/// 休眠到截止时间（固定节拍），期间响应停止请求
fn sleep_until(deadline: Instant, is_running: &AtomicBool) {
    loop {
        let now = Instant::now();
        if now >= deadline || !is_running.load(Ordering::Acquire) {
            return;
        }
        spin_sleep::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
