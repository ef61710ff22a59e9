//! 笔迹回放工具
//!
//! - 不带参数：列出存储中保存了笔迹的题目
//! - `word_test <题目ID>`：把该题四个格子的笔迹回放到位图上并输出统计

use anyhow::{Context, Result};
use tracing::{info, warn};

use word_test::infrastructure::{FileStorage, RasterSurface};
use word_test::models::{QuestionId, RECT_COUNT};
use word_test::services::{question_id_from_key, PathStore, StrokeRenderer};
use word_test::utils::logging;
use word_test::Config;

fn load_config() -> Result<Config> {
    match std::env::var("WORD_TEST_CONFIG") {
        Ok(path) => Config::from_toml_file(&path).with_context(|| format!("读取配置 {} 失败", path)),
        Err(_) => Ok(Config::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let storage = FileStorage::from_config(&config);

    let Some(arg) = std::env::args().nth(1) else {
        let ids: Vec<QuestionId> = storage
            .keys()
            .await?
            .iter()
            .filter_map(|key| question_id_from_key(key))
            .collect();
        if ids.is_empty() {
            info!("存储中没有笔迹记录");
        }
        for id in ids {
            println!("{}", id);
        }
        return Ok(());
    };

    let question_id: QuestionId = arg
        .parse()
        .with_context(|| format!("无效的题目 ID: {}", arg))?;

    let mut store = PathStore::new();
    if !store.load_question(&storage, question_id).await? {
        warn!("⚠️ 题目 {} 没有保存的笔迹", question_id);
        return Ok(());
    }
    let canvas_size = store
        .question(question_id)
        .map(|set| set.canvas_size())
        .unwrap_or(config.canvas_size);

    for rect in 0..RECT_COUNT {
        let mut renderer = StrokeRenderer::new(
            RasterSurface::square(canvas_size, 1.0),
            RasterSurface::square(canvas_size, 1.0),
            config.line_width,
        );
        let strokes = store.replay_into(question_id, rect, &mut renderer);
        let ink = renderer.snapshot().ink_pixel_count();
        info!("格子 {}: {} 笔, {} 个墨迹像素", rect + 1, strokes, ink);
    }

    Ok(())
}
