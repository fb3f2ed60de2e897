//! 事件中介层
//!
//! 外部调用方通过 [`EventMediator::submit`] 提交类型化命令，并在超时内同步等待
//! 唯一的控制线程返回 `{message, status}` 响应。
//!
//! - 单一 FIFO 队列：设备/配方模式的修改严格按提交顺序串行执行
//! - 格式错误的请求在调用方线程被拒绝（400），不进入控制线程
//! - 超时（504）不撤回请求，迟到的响应被丢弃
//!
//! # 示例
//!
//! ```
//! use std::sync::Arc;
//! use sprout_event::{channel, CommandHandler, ControlThread, EventRequest, InMemoryRecipeRepository, MediatorConfig};
//! use sprout_state::{RecipeMode, SharedState};
//!
//! let state = Arc::new(SharedState::new());
//! let recipes = InMemoryRecipeRepository::new();
//! let (mediator, queue) = channel(&MediatorConfig::default());
//! let _control = ControlThread::spawn(queue, CommandHandler::new(state.clone(), recipes)).unwrap();
//!
//! let response = mediator.submit(EventRequest::create_recipe(r#"{"uuid": "r1", "name": "Basil"}"#));
//! assert_eq!(response.status, 200);
//! let response = mediator.submit(EventRequest::start_recipe("r1", None));
//! assert_eq!(response.status, 200);
//! assert_eq!(state.recipe_mode(), Some(RecipeMode::Normal));
//! ```

mod error;
mod handler;
mod mediator;
mod recipe;
mod request;
mod response;

pub use error::{RecipeError, RequestError};
pub use handler::CommandHandler;
pub use mediator::{ControlThread, EventMediator, EventQueue, MediatorConfig, channel};
pub use recipe::{InMemoryRecipeRepository, RecipeRepository, RecipeSummary};
pub use request::{EventRequest, PeripheralCommand};
pub use response::{
    EventResponse, STATUS_BAD_REQUEST, STATUS_INTERNAL_ERROR, STATUS_NOT_FOUND, STATUS_OK,
    STATUS_TIMEOUT, STATUS_UNAVAILABLE,
};
