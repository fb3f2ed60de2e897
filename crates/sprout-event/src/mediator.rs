//! 事件中介与控制线程
//!
//! # 架构
//!
//! ```text
//! 调用方 ──submit──▶ 有界 FIFO 队列 ──▶ 控制线程（逐条执行）
//!    ▲                                      │
//!    └──────── 每个请求一个容量为 1 的应答通道 ◀┘
//! ```
//!
//! - 所有请求经同一队列，控制线程按入队顺序逐条执行，设备/配方模式的修改因此严格串行
//! - `submit` 在入队和等待应答上共享同一个截止时间，超时返回 504
//! - 超时不撤回已入队的请求：控制线程仍会执行，迟到的应答被丢弃

use crate::error::RequestError;
use crate::handler::CommandHandler;
use crate::request::EventRequest;
use crate::response::EventResponse;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sprout_state::{DeviceMode, JoinTimeout};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 中介配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// `submit` 的最长等待时间（毫秒）
    pub timeout_ms: u64,
    /// 队列容量（满时 `submit` 阻塞到超时）
    pub queue_capacity: usize,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            queue_capacity: 32,
        }
    }
}

impl MediatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("mediator.timeout_ms must be >= 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("mediator.queue_capacity must be >= 1".to_string());
        }
        Ok(())
    }
}

/// 队列中的一条请求及其应答通道
struct Envelope {
    request: EventRequest,
    reply: Sender<EventResponse>,
}

enum Message {
    Request(Envelope),
    /// 排在所有已入队请求之后，控制线程收到后退出
    Shutdown,
}

/// 事件中介（可克隆，跨线程共享）
#[derive(Clone)]
pub struct EventMediator {
    tx: Sender<Message>,
    timeout: Duration,
}

/// 控制线程消费的队列端
pub struct EventQueue {
    rx: Receiver<Message>,
    tx: Sender<Message>,
}

/// 创建中介与队列端
pub fn channel(config: &MediatorConfig) -> (EventMediator, EventQueue) {
    let (tx, rx) = crossbeam_channel::bounded(config.queue_capacity.max(1));
    let mediator = EventMediator {
        tx: tx.clone(),
        timeout: config.timeout(),
    };
    (mediator, EventQueue { rx, tx })
}

impl EventMediator {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 提交请求并阻塞等待响应
    ///
    /// 总是返回结构化响应：
    /// - 控制线程的执行结果
    /// - `504`：截止时间内未入队或未收到应答（请求可能仍会被执行）
    /// - `503`：控制线程已退出
    pub fn submit(&self, request: EventRequest) -> EventResponse {
        let deadline = Instant::now() + self.timeout;
        let kind = request.kind();
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);

        let message = Message::Request(Envelope {
            request,
            reply: reply_tx,
        });
        match self.tx.send_timeout(message, remaining(deadline)) {
            Ok(()) => {},
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("Event queue full, {} request timed out", kind);
                return EventResponse::timeout();
            },
            Err(SendTimeoutError::Disconnected(_)) => return EventResponse::unavailable(),
        }

        match reply_rx.recv_timeout(remaining(deadline)) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Timed out waiting for {} response after {:?}", kind, self.timeout);
                EventResponse::timeout()
            },
            Err(RecvTimeoutError::Disconnected) => EventResponse::unavailable(),
        }
    }

    /// 解析 JSON 请求后提交；格式错误直接返回 400，不进入队列
    pub fn submit_json(&self, value: &Value) -> EventResponse {
        match EventRequest::from_json(value) {
            Ok(request) => self.submit(request),
            Err(e) => reject(e),
        }
    }
}

fn reject(err: RequestError) -> EventResponse {
    debug!("Rejected malformed request: {}", err);
    EventResponse::bad_request(err.to_string())
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// 控制线程句柄
///
/// 启动时把 `device.mode` 置为 NORMAL，退出时置为 SHUTDOWN。
/// Drop 时在队尾放入退出消息，已入队的请求仍会被执行。
pub struct ControlThread {
    shutdown_tx: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl ControlThread {
    /// 在新线程上消费队列
    ///
    /// # 错误
    /// - `std::io::Error`: 系统无法创建线程
    pub fn spawn(queue: EventQueue, handler: CommandHandler) -> std::io::Result<Self> {
        let EventQueue { rx, tx } = queue;
        let handle = std::thread::Builder::new()
            .name("control".to_string())
            .spawn(move || control_loop(rx, handler))?;
        info!("Control thread started");
        Ok(Self {
            shutdown_tx: tx,
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// 处理完已入队请求后退出，最多等待 `timeout`
    pub fn shutdown(mut self, timeout: Duration) {
        self.stop(timeout);
    }

    fn stop(&mut self, timeout: Duration) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.shutdown_tx.send_timeout(Message::Shutdown, timeout).is_err() {
            warn!("Unable to enqueue control thread shutdown");
        }
        if handle.join_timeout(timeout).is_err() {
            error!("Control thread panicked or failed to shut down within {:?}", timeout);
        }
    }
}

impl Drop for ControlThread {
    fn drop(&mut self) {
        self.stop(Duration::from_secs(2));
    }
}

fn control_loop(rx: Receiver<Message>, mut handler: CommandHandler) {
    let state = handler.state().clone();
    state.set_device_mode(DeviceMode::Normal);

    let mut seq: u64 = 0;
    for message in rx.iter() {
        let Message::Request(Envelope { request, reply }) = message else {
            break;
        };
        seq += 1;
        debug!(seq, "Handling {} request", request.kind());

        let response = handler.handle(&request);
        trace!(seq, "Response: {}", response);

        // 调用方已超时离开时应答通道已断开，丢弃迟到的响应
        if reply.try_send(response).is_err() {
            debug!(seq, "Discarded late {} response", request.kind());
        }
    }

    state.set_device_mode(DeviceMode::Shutdown);
    info!("Control thread stopped after {} requests", seq);
}
