//! 已存储查询注册表
//!
//! key → 查询文本。读多写少，使用 DashMap 避免全局锁。

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    queries: Arc<DashMap<String, Arc<str>>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存查询，返回是否覆盖了已有的查询
    pub fn put(&self, key: impl Into<String>, query: impl Into<String>) -> bool {
        let query: String = query.into();
        self.queries.insert(key.into(), Arc::from(query)).is_some()
    }

    pub fn get(&self, key: &str) -> Result<Arc<str>> {
        self.queries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.queries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.queries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// 从 JSON 文件加载 `{ "key": "query", ... }`，返回加载数量
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            Error::InputFormat(format!("查询文件 {} 格式错误: {}", path.display(), e))
        })?;
        let count = entries.len();
        for (key, query) in entries {
            self.put(key, query);
        }
        tracing::info!(path = %path.display(), count, "已加载存储查询");
        Ok(count)
    }
}
