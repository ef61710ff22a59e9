//! 键值存储 - 基础设施层
//!
//! 只暴露 read / write / delete 三种能力，不认识笔迹或题集

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use regex::Regex;
use tokio::fs;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult, StorageError};
use crate::utils::lock;

/// 键不存在时 `read` 返回的值
pub const EMPTY_VALUE: &str = "[]";

/// 键值存储
#[async_trait]
pub trait Storage: Send + Sync {
    /// 读取键对应的值，不存在时返回 `"[]"`
    async fn read(&self, key: &str) -> AppResult<String>;

    async fn write(&self, key: &str, value: &str) -> AppResult<()>;

    /// 删除键；键不存在不算错误
    async fn delete(&self, key: &str) -> AppResult<()>;
}

fn wrap_key(prefix: &str, key: &str) -> String {
    format!("{}_{}", prefix, key)
}

/// 基于文件的存储，每个键一个 JSON 文件
pub struct FileStorage {
    dir: PathBuf,
    prefix: String,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.storage_dir, &config.storage_prefix)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", wrap_key(&self.prefix, key)))
    }

    /// 列出目录中属于本前缀的所有键
    pub async fn keys(&self) -> AppResult<Vec<String>> {
        let pattern = Regex::new(&format!(r"^{}_(.+)\.json$", regex::escape(&self.prefix)))
            .expect("escaped prefix is a valid pattern");

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::ListFailed {
                    dir: self.dir.display().to_string(),
                    source,
                }
                .into())
            }
        };

        let mut keys = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StorageError::ListFailed {
                dir: self.dir.display().to_string(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(caps) = pattern.captures(&name) {
                keys.push(caps[1].to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, key: &str) -> AppResult<String> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(EMPTY_VALUE.to_string()),
            Err(e) => Err(AppError::storage_read(key, e)),
        }
    }

    async fn write(&self, key: &str, value: &str) -> AppResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::storage_write(key, e))?;
        fs::write(self.path_for(key), value)
            .await
            .map_err(|e| AppError::storage_write(key, e))?;
        debug!("写入 {} ({} 字节)", key, value.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage_delete(key, e)),
        }
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.entries).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, key: &str) -> AppResult<String> {
        Ok(lock(&self.entries)
            .get(key)
            .cloned()
            .unwrap_or_else(|| EMPTY_VALUE.to_string()))
    }

    async fn write(&self, key: &str, value: &str) -> AppResult<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}
