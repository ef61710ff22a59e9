use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ConfigError};
use crate::services::OffsetPolicy;

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 笔迹与题集的存储目录
    pub storage_dir: String,
    /// 存储键前缀
    pub storage_prefix: String,
    /// 启动时创建的识别 worker 数量（0 表示首次识别时再创建）
    pub worker_count: usize,
    /// 识别语言
    pub languages: Vec<String>,
    /// 笔画结束后触发识别的防抖时间（毫秒）
    pub debounce_ms: u64,
    /// 轮询识别的最小间隔（毫秒）
    pub min_interval_ms: u64,
    /// 笔画线宽
    pub line_width: f64,
    /// 触摸坐标偏移的计算时机
    pub offset_policy: OffsetPolicy,
    /// 回放时画布的逻辑尺寸
    pub canvas_size: f64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: "word_test_data".to_string(),
            storage_prefix: "word-test".to_string(),
            worker_count: 0,
            languages: vec!["chi_sim".to_string()],
            debounce_ms: 100,
            min_interval_ms: 50,
            line_width: 2.0,
            offset_policy: OffsetPolicy::BindTime,
            canvas_size: 300.0,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            storage_dir: std::env::var("STORAGE_DIR").unwrap_or(default.storage_dir),
            storage_prefix: std::env::var("STORAGE_PREFIX").unwrap_or(default.storage_prefix),
            worker_count: std::env::var("WORKER_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.worker_count),
            languages: std::env::var("RECOGNITION_LANGUAGES")
                .ok()
                .map(|v| v.split('+').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect::<Vec<_>>())
                .filter(|langs| !langs.is_empty())
                .unwrap_or(default.languages),
            debounce_ms: std::env::var("DEBOUNCE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.debounce_ms),
            min_interval_ms: std::env::var("MIN_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_interval_ms),
            line_width: std::env::var("LINE_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(default.line_width),
            offset_policy: std::env::var("OFFSET_POLICY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.offset_policy),
            canvas_size: std::env::var("CANVAS_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.canvas_size),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 文件加载配置，缺失的字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}
