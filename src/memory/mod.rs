use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Memory元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub access_counts: HashMap<String, u64>,
    pub data_sizes: HashMap<String, usize>,
    pub total_size: usize,
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            last_updated: Utc::now(),
            access_counts: HashMap::new(),
            data_sizes: HashMap::new(),
            total_size: 0,
        }
    }
}

/// 运行快照存储
///
/// 以 `scope:key` 为键保存 JSON 快照（scope 为流程图名称，key 为线程标识）。
/// 配置了落盘目录时，每次写入同步镜像到 `{dir}/{scope}/{key}.json`，
/// 内存中未命中时从磁盘回读，使暂停的运行可以跨进程恢复。
#[derive(Debug)]
pub struct Memory {
    data: HashMap<String, Value>,
    metadata: MemoryMetadata,
    persist_dir: Option<PathBuf>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            metadata: MemoryMetadata::new(),
            persist_dir: None,
        }
    }

    /// 带落盘目录的存储
    pub fn with_persist_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            persist_dir: Some(dir.into()),
            ..Self::new()
        }
    }

    pub fn persist_dir(&self) -> Option<&Path> {
        self.persist_dir.as_deref()
    }

    fn full_key(scope: &str, key: &str) -> String {
        format!("{}:{}", scope, key)
    }

    fn file_path(&self, scope: &str, key: &str) -> Option<PathBuf> {
        self.persist_dir
            .as_ref()
            .map(|dir| dir.join(scope).join(format!("{}.json", sanitize(key))))
    }

    /// 存储数据到指定作用域和键
    pub async fn store<T>(&mut self, scope: &str, key: &str, data: T) -> Result<()>
    where
        T: Serialize,
    {
        let full_key = Self::full_key(scope, key);
        let serialized = serde_json::to_value(data)?;

        if let Some(path) = self.file_path(scope, key) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&serialized)?;
            fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        }

        // 计算数据大小
        let data_size = serialized.to_string().len();

        // 更新元数据
        if let Some(old_size) = self.metadata.data_sizes.get(&full_key) {
            self.metadata.total_size -= old_size;
        }
        self.metadata.data_sizes.insert(full_key.clone(), data_size);
        self.metadata.total_size += data_size;
        self.metadata.last_updated = Utc::now();

        self.data.insert(full_key, serialized);
        Ok(())
    }

    /// 从指定作用域和键获取数据，内存未命中时尝试从磁盘加载
    pub async fn get<T>(&mut self, scope: &str, key: &str) -> Result<Option<T>>
    where
        T: for<'a> Deserialize<'a>,
    {
        let full_key = Self::full_key(scope, key);

        // 更新访问计数
        *self
            .metadata
            .access_counts
            .entry(full_key.clone())
            .or_insert(0) += 1;

        if !self.data.contains_key(&full_key)
            && let Some(path) = self.file_path(scope, key)
            && path.exists()
        {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            let value: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
            self.data.insert(full_key.clone(), value);
        }

        match self.data.get(&full_key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// 检查是否存在指定数据
    pub fn has_data(&self, scope: &str, key: &str) -> bool {
        self.data.contains_key(&Self::full_key(scope, key))
            || self
                .file_path(scope, key)
                .map(|path| path.exists())
                .unwrap_or(false)
    }

    /// 获取内存使用统计
    pub fn get_usage_stats(&self) -> HashMap<String, usize> {
        let mut stats = HashMap::new();

        for (key, size) in &self.metadata.data_sizes {
            let scope = key.split(':').next().unwrap_or("unknown").to_string();
            *stats.entry(scope).or_insert(0) += size;
        }

        stats
    }
}

/// 线程标识用作文件名前去掉路径分隔符
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '.' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_and_get_in_memory() {
        let mut memory = Memory::new();
        memory.store("research", "1", vec!["a", "b"]).await.unwrap();

        let value: Option<Vec<String>> = memory.get("research", "1").await.unwrap();
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));

        let missing: Option<Vec<String>> = memory.get("research", "2").await.unwrap();
        assert!(missing.is_none());
        assert!(memory.has_data("research", "1"));
        assert!(!memory.has_data("interview", "1"));
    }

    #[tokio::test]
    async fn test_overwrite_updates_usage_stats() {
        let mut memory = Memory::new();
        memory.store("research", "1", "short").await.unwrap();
        memory
            .store("research", "1", "a much longer value")
            .await
            .unwrap();
        memory.store("analysts", "1", "x").await.unwrap();

        let stats = memory.get_usage_stats();
        assert_eq!(stats["research"], "\"a much longer value\"".len());
        assert_eq!(stats["analysts"], "\"x\"".len());
        assert_eq!(stats.len(), 2);
    }

    #[tokio::test]
    async fn test_persisted_snapshot_survives_new_instance() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut memory = Memory::with_persist_dir(temp_dir.path());
            memory.store("research", "thread/1", 42u32).await.unwrap();
        }
        assert!(temp_dir.path().join("research").join("thread_1.json").exists());

        let mut fresh = Memory::with_persist_dir(temp_dir.path());
        assert!(fresh.has_data("research", "thread/1"));
        let value: Option<u32> = fresh.get("research", "thread/1").await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_get_with_wrong_type_is_error() {
        let mut memory = Memory::new();
        memory.store("research", "1", "text").await.unwrap();
        let result: Result<Option<u32>> = memory.get("research", "1").await;
        assert!(result.is_err());
    }
}
