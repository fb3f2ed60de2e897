//! 事件中介集成测试
//!
//! 通过真实的控制线程验证请求校验、超时语义与并发提交下的串行执行。

use serde_json::json;
use sprout_event::{
    CommandHandler, ControlThread, EventMediator, EventRequest, InMemoryRecipeRepository,
    MediatorConfig, PeripheralCommand, RecipeError, RecipeRepository, RecipeSummary, channel,
};
use sprout_state::{PeripheralMode, RecipeMode, Section, SharedState, keys};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BASIL: &str = r#"{"uuid": "basil-1", "name": "Basil", "phases": []}"#;

fn spawn_with(
    config: MediatorConfig,
    recipes: impl RecipeRepository + 'static,
) -> (EventMediator, ControlThread, Arc<SharedState>) {
    let state = Arc::new(SharedState::new());
    let (mediator, queue) = channel(&config);
    let control = ControlThread::spawn(queue, CommandHandler::new(state.clone(), recipes)).unwrap();
    (mediator, control, state)
}

fn spawn() -> (EventMediator, ControlThread, Arc<SharedState>) {
    let recipes = InMemoryRecipeRepository::new().with_recipe(BASIL).unwrap();
    spawn_with(MediatorConfig::default(), recipes)
}

#[test]
fn test_create_recipe_without_json_is_rejected() {
    let recipes = InMemoryRecipeRepository::new();
    let (mediator, _control, state) = spawn_with(MediatorConfig::default(), recipes.clone());

    let response = mediator.submit_json(&json!({"type": "CREATE_RECIPE"}));
    assert_eq!(response.status, 400);
    assert_eq!(response.message, "Request does not contain `json`");
    assert!(recipes.is_empty());
    assert!(state.section_snapshot(Section::Recipe).is_empty());
}

#[test]
fn test_start_recipe_without_id_names_both_fields() {
    let (mediator, _control, state) = spawn();
    let response = mediator.submit_json(&json!({"type": "START_RECIPE"}));
    assert_eq!(response.status, 400);
    assert_eq!(response.message, "Request does not contain `uuid` (or `recipe_id`)");
    assert_eq!(state.recipe_mode(), None);
}

#[test]
fn test_unknown_request_type_is_rejected() {
    let (mediator, _control, state) = spawn();
    let response = mediator.submit_json(&json!({"type": "FORMAT_DISK"}));
    assert_eq!(response.status, 400);
    assert!(response.message.contains("FORMAT_DISK"));
    assert!(state.section_snapshot(Section::Recipe).is_empty());
}

#[test]
fn test_start_recipe_sets_running_state() {
    let (mediator, _control, state) = spawn();
    let response = mediator.submit_json(&json!({"type": "START_RECIPE", "recipe_id": "basil-1"}));
    assert_eq!(response.status, 200, "{}", response);
    assert_eq!(state.recipe_mode(), Some(RecipeMode::Normal));
    assert_eq!(state.get(Section::Recipe, keys::RECIPE_UUID).unwrap(), "basil-1");
    assert_eq!(state.get(Section::Recipe, keys::RECIPE_NAME).unwrap(), "Basil");
    assert!(state.get(Section::Recipe, keys::START_TIME).is_some());
}

#[test]
fn test_create_then_start_through_json() {
    let (mediator, _control, state) = spawn();
    let response = mediator.submit_json(&json!({
        "type": "CREATE_RECIPE",
        "json": {"uuid": "tomato-1", "name": "Tomato"}
    }));
    assert_eq!(response.status, 200);

    let response = mediator.submit_json(&json!({
        "type": "START_RECIPE",
        "uuid": "tomato-1",
        "start_timestamp_minutes": 42
    }));
    assert_eq!(response.status, 200);
    assert_eq!(state.get(Section::Recipe, keys::START_TIME).unwrap(), 42);
}

#[test]
fn test_peripheral_command_through_mediator() {
    let (mediator, _control, state) = spawn();
    state.register_peripheral("ec-1");
    state.set_peripheral_mode("ec-1", PeripheralMode::Normal);

    let response = mediator.submit(EventRequest::peripheral_command(
        "ec-1",
        PeripheralCommand::EnterCalibration,
    ));
    assert_eq!(response.status, 200);
    assert_eq!(state.peripheral_mode("ec-1"), Some(PeripheralMode::Calibrate));

    let response = mediator.submit_json(&json!({
        "type": "PERIPHERAL_COMMAND",
        "peripheral": "ph-1",
        "command": "RESET"
    }));
    assert_eq!(response.status, 404);
}

/// fetch 故意变慢的配方存储
struct SlowRepository {
    inner: InMemoryRecipeRepository,
    delay: Duration,
}

impl RecipeRepository for SlowRepository {
    fn fetch(&self, uuid: &str) -> Result<Option<String>, RecipeError> {
        thread::sleep(self.delay);
        self.inner.fetch(uuid)
    }

    fn create(&mut self, summary: &RecipeSummary, json: &str) -> Result<(), RecipeError> {
        self.inner.create(summary, json)
    }
}

#[test]
fn test_timeout_does_not_retract_request() {
    let recipes = SlowRepository {
        inner: InMemoryRecipeRepository::new().with_recipe(BASIL).unwrap(),
        delay: Duration::from_millis(200),
    };
    let config = MediatorConfig {
        timeout_ms: 50,
        ..MediatorConfig::default()
    };
    let (mediator, _control, state) = spawn_with(config, recipes);

    let response = mediator.submit(EventRequest::start_recipe("basil-1", Some(7)));
    assert_eq!(response.status, 504);

    // 控制线程仍会执行超时的请求
    let deadline = Instant::now() + Duration::from_secs(2);
    while state.recipe_mode() != Some(RecipeMode::Normal) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(state.recipe_mode(), Some(RecipeMode::Normal));

    // 迟到的响应被丢弃，后续请求得到自己的响应
    let response = mediator.submit(EventRequest::StopRecipe);
    assert_eq!(response.status, 200, "{}", response);
}

#[test]
fn test_concurrent_submissions_are_serialized() {
    let (mediator, _control, state) = spawn();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let mediator = mediator.clone();
            thread::spawn(move || {
                let mut started = 0i64;
                let mut stopped = 0i64;
                for j in 0..25 {
                    let request = if (i + j) % 2 == 0 {
                        EventRequest::start_recipe("basil-1", Some(j))
                    } else {
                        EventRequest::StopRecipe
                    };
                    let is_start = matches!(request, EventRequest::StartRecipe { .. });
                    let response = mediator.submit(request);
                    if response.status == 200 {
                        if is_start {
                            started += 1;
                        } else {
                            stopped += 1;
                        }
                    } else {
                        assert_eq!(response.status, 400, "{}", response);
                    }
                }
                (started, stopped)
            })
        })
        .collect();

    let (started, stopped) = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .fold((0, 0), |(a, b), (s, t)| (a + s, b + t));

    // 成功的启动与停止必须交替出现
    let running = state.recipe_mode() == Some(RecipeMode::Normal);
    assert_eq!(started - stopped, i64::from(running));
    assert_eq!(
        state.get(Section::Recipe, keys::RECIPE_UUID).is_some(),
        running
    );
}
