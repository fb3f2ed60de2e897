//! 配方持久化边界
//!
//! 配方以不透明的 JSON 文本交给存储后端；核心只解析 `uuid` 与 `name`。
//! 数据库后端不在本 crate 内，这里只提供 trait 和一个内存实现。

use crate::error::RecipeError;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// 从配方文本中解析出的最小字段
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecipeSummary {
    pub uuid: String,
    pub name: String,
}

impl RecipeSummary {
    /// 解析配方文本（其余字段忽略）
    pub fn parse(json: &str) -> Result<Self, RecipeError> {
        serde_json::from_str(json).map_err(|e| RecipeError::InvalidJson(e.to_string()))
    }
}

/// 配方存储后端
pub trait RecipeRepository: Send {
    /// 按 uuid 读取配方文本
    fn fetch(&self, uuid: &str) -> Result<Option<String>, RecipeError>;

    /// 保存新配方；uuid 已存在时返回 `RecipeError::Duplicate`
    fn create(&mut self, summary: &RecipeSummary, json: &str) -> Result<(), RecipeError>;
}

impl<R: RecipeRepository + ?Sized> RecipeRepository for Box<R> {
    fn fetch(&self, uuid: &str) -> Result<Option<String>, RecipeError> {
        (**self).fetch(uuid)
    }

    fn create(&mut self, summary: &RecipeSummary, json: &str) -> Result<(), RecipeError> {
        (**self).create(summary, json)
    }
}

/// 内存配方存储（克隆共享同一份数据）
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecipeRepository {
    recipes: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryRecipeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一个配方
    pub fn with_recipe(self, json: &str) -> Result<Self, RecipeError> {
        let mut repository = self;
        let summary = RecipeSummary::parse(json)?;
        repository.create(&summary, json)?;
        Ok(repository)
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.recipes.read().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.recipes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.read().is_empty()
    }
}

impl RecipeRepository for InMemoryRecipeRepository {
    fn fetch(&self, uuid: &str) -> Result<Option<String>, RecipeError> {
        Ok(self.recipes.read().get(uuid).cloned())
    }

    fn create(&mut self, summary: &RecipeSummary, json: &str) -> Result<(), RecipeError> {
        let mut recipes = self.recipes.write();
        if recipes.contains_key(&summary.uuid) {
            return Err(RecipeError::Duplicate(summary.uuid.clone()));
        }
        recipes.insert(summary.uuid.clone(), json.to_string());
        Ok(())
    }
}
