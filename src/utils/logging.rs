/// 日志工具模块
///
/// 负责初始化 tracing 订阅者，并提供启动信息的输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// 优先使用 `RUST_LOG` 环境变量，否则按 `verbose` 选择 debug / info 级别。
/// 重复调用是安全的（测试中经常如此）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("📁 存储目录: {}", config.storage_dir);
    info!("🔤 识别语言: {}", config.languages.join("+"));
    info!(
        "⏱️ 防抖 {}ms / 最小轮询间隔 {}ms",
        config.debounce_ms, config.min_interval_ms
    );
    info!("{}", "=".repeat(60));
}
