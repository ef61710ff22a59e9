use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储读写错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 识别任务错误
    #[error("识别错误: {0}")]
    Recognition(#[from] RecognitionError),
    /// 笔迹存储错误
    #[error("笔迹错误: {0}")]
    Store(#[from] StoreError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// JSON 解析失败
    #[error("JSON解析失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 存储相关错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 读取失败
    #[error("读取 {key} 失败: {source}")]
    ReadFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入 {key} 失败: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// 删除失败
    #[error("删除 {key} 失败: {source}")]
    DeleteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// 枚举存储目录失败
    #[error("无法读取存储目录 {dir}: {source}")]
    ListFailed {
        dir: String,
        #[source]
        source: std::io::Error,
    },
}

/// 识别相关错误
///
/// 需要通过广播通道分发给多个订阅者，所以只保存可克隆的信息
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// 创建 worker 失败
    #[error("创建识别 worker 失败: {0}")]
    WorkerCreationFailed(String),
    /// 识别引擎返回错误
    #[error("识别引擎失败 (worker #{worker}): {message}")]
    EngineFailed { worker: u64, message: String },
    /// 任务执行期间 worker 被终止
    #[error("worker #{0} 已终止，任务未完成")]
    WorkerTerminated(u64),
    /// 没有可用的 worker
    #[error("识别池中没有可用的 worker")]
    NoWorkers,
    /// 任务队列已关闭
    #[error("识别任务队列已关闭")]
    QueueClosed,
}

/// 笔迹存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 格子索引超出范围
    #[error("格子索引 {rect} 超出范围 [0, {max}]")]
    RectOutOfRange { rect: usize, max: usize },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件 {path} 失败: {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建存储读取错误
    pub fn storage_read(key: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::ReadFailed {
            key: key.into(),
            source,
        })
    }

    /// 创建存储写入错误
    pub fn storage_write(key: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::WriteFailed {
            key: key.into(),
            source,
        })
    }

    /// 创建存储删除错误
    pub fn storage_delete(key: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::DeleteFailed {
            key: key.into(),
            source,
        })
    }

    /// 创建格子越界错误
    pub fn rect_out_of_range(rect: usize, max: usize) -> Self {
        AppError::Store(StoreError::RectOutOfRange { rect, max })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
