//! 命令执行逻辑（只在控制线程上运行）
//!
//! `CommandHandler` 持有设备级与配方级模式的唯一写权限。外设模式由各外设管理器
//! 与本处理器共同写入，两边都通过比较替换完成转换。

use crate::error::RecipeError;
use crate::recipe::{RecipeRepository, RecipeSummary};
use crate::request::{EventRequest, PeripheralCommand};
use crate::response::EventResponse;
use sprout_state::{RecipeMode, Section, SharedState, keys};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// 控制线程上的命令处理器
pub struct CommandHandler {
    state: Arc<SharedState>,
    recipes: Box<dyn RecipeRepository>,
}

impl CommandHandler {
    pub fn new(state: Arc<SharedState>, recipes: impl RecipeRepository + 'static) -> Self {
        Self {
            state,
            recipes: Box::new(recipes),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// 执行一条请求并构造响应
    pub fn handle(&mut self, request: &EventRequest) -> EventResponse {
        match request {
            EventRequest::CreateRecipe { json } => self.create_recipe(json),
            EventRequest::StartRecipe {
                uuid,
                start_timestamp_minutes,
            } => self.start_recipe(uuid, *start_timestamp_minutes),
            EventRequest::StopRecipe => self.stop_recipe(),
            EventRequest::PeripheralCommand {
                peripheral,
                command,
            } => self.peripheral_command(peripheral, *command),
        }
    }

    fn create_recipe(&mut self, json: &str) -> EventResponse {
        let summary = match RecipeSummary::parse(json) {
            Ok(summary) => summary,
            Err(e) => return EventResponse::bad_request(e.to_string()),
        };
        match self.recipes.create(&summary, json) {
            Ok(()) => {
                info!("Created recipe `{}` ({})", summary.name, summary.uuid);
                EventResponse::ok(format!("Created recipe `{}`", summary.name))
            },
            Err(e @ (RecipeError::Duplicate(_) | RecipeError::InvalidJson(_))) => {
                EventResponse::bad_request(e.to_string())
            },
            Err(e @ RecipeError::Storage(_)) => {
                warn!("Unable to create recipe: {}", e);
                EventResponse::internal_error(e.to_string())
            },
        }
    }

    fn start_recipe(&mut self, uuid: &str, start_timestamp_minutes: Option<i64>) -> EventResponse {
        if self.recipe_running() {
            let name = self
                .state
                .get(Section::Recipe, keys::RECIPE_NAME)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            return EventResponse::bad_request(format!(
                "Unable to start recipe, `{}` is already running",
                name
            ));
        }

        let json = match self.recipes.fetch(uuid) {
            Ok(Some(json)) => json,
            Ok(None) => return EventResponse::not_found(format!("Recipe `{}` does not exist", uuid)),
            Err(e) => {
                warn!("Unable to fetch recipe {}: {}", uuid, e);
                return EventResponse::internal_error(e.to_string());
            },
        };
        let summary = match RecipeSummary::parse(&json) {
            Ok(summary) => summary,
            Err(e) => return EventResponse::bad_request(e.to_string()),
        };

        let start_time = start_timestamp_minutes.unwrap_or_else(now_minutes);
        self.clear_recipe_progress();
        self.state.set(Section::Recipe, keys::RECIPE_UUID, summary.uuid.as_str());
        self.state.set(Section::Recipe, keys::RECIPE_NAME, summary.name.as_str());
        self.state.set(Section::Recipe, keys::START_TIME, start_time);
        self.state.set_recipe_mode(RecipeMode::Normal);

        info!("Started recipe `{}` ({}) at minute {}", summary.name, summary.uuid, start_time);
        EventResponse::ok(format!("Started recipe `{}`", summary.name))
    }

    fn stop_recipe(&mut self) -> EventResponse {
        if !self.recipe_running() {
            return EventResponse::bad_request("Unable to stop recipe, no recipe is running");
        }
        self.clear_recipe_progress();
        self.state.set_recipe_mode(RecipeMode::NoRecipe);
        info!("Stopped recipe");
        EventResponse::ok("Stopped recipe")
    }

    fn peripheral_command(&mut self, name: &str, command: PeripheralCommand) -> EventResponse {
        // 写外设分区会隐式创建记录，必须先确认外设已注册
        if !self.state.has_peripheral(name) {
            return EventResponse::not_found(format!("Unknown peripheral `{}`", name));
        }

        match self
            .state
            .transition_peripheral_mode(name, command.allowed_from(), command.target())
        {
            Ok(previous) => {
                info!(peripheral = %name, "{}: {} -> {}", command, previous, command.target());
                EventResponse::ok(format!(
                    "Peripheral `{}` {} -> {}",
                    name,
                    previous,
                    command.target()
                ))
            },
            Err(Some(current)) => EventResponse::bad_request(format!(
                "Unable to {} peripheral `{}` in {} mode",
                command, name, current
            )),
            Err(None) => EventResponse::not_found(format!("Unknown peripheral `{}`", name)),
        }
    }

    fn recipe_running(&self) -> bool {
        self.state.recipe_mode().is_some_and(|mode| mode.is_running())
    }

    fn clear_recipe_progress(&self) {
        for key in keys::RECIPE_PROGRESS {
            self.state.remove(Section::Recipe, key);
        }
    }
}

fn now_minutes() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| (elapsed.as_secs() / 60) as i64)
        .unwrap_or_default()
}
