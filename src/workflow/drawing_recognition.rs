//! 手写识别协调器 - 工作流层
//!
//! 把一组笔画采集器接到识别池上：
//!
//! ```text
//! StrokeCapture::End ──┐
//! StrokeCapture::End ──┼─> 去抖 (默认 100ms) ─> 所有格子截图 ─> pool.recognize ─> 分类 ─> 广播结果
//! StrokeCapture::End ──┘
//! ```
//!
//! 连续几笔只会触发最后一次识别。识别结果按格子顺序排列，
//! 任何一个格子识别出多于一个字时判定为 `ErrorRepeatCharInOneRect`。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::{RecognizedPage, Surface, SurfaceImage};
use crate::models::{QuestionId, WordCheckStatus, WordSet};
use crate::orchestrator::RecognitionWorkerPool;
use crate::services::{StrokeCapture, StrokeEvent};
use crate::utils::lock;
use crate::workflow::debounce::Debounce;

/// 协调器与界面共享的采集器
pub type SharedCapture<S> = Arc<Mutex<StrokeCapture<S>>>;

const EVENT_CAPACITY: usize = 16;

/// 一次识别的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOutcome {
    pub status: WordCheckStatus,
    /// 每个格子的文字，顺序与采集器顺序一致
    pub texts: Vec<String>,
}

impl RecognitionOutcome {
    pub fn failure() -> Self {
        Self {
            status: WordCheckStatus::Failure,
            texts: Vec::new(),
        }
    }

    /// 所有格子拼接成的答案
    pub fn answer(&self) -> String {
        self.texts.concat()
    }
}

/// 去掉识别结果末尾的换行
pub fn clean_text(text: &str) -> String {
    text.trim_end_matches(['\n', '\r']).to_string()
}

/// 按格子整理识别结果并判定状态
pub fn classify(pages: &[RecognizedPage]) -> RecognitionOutcome {
    let texts: Vec<String> = pages.iter().map(|page| clean_text(&page.text)).collect();
    let status = if texts.iter().any(|text| text.chars().count() > 1) {
        WordCheckStatus::ErrorRepeatCharInOneRect
    } else {
        WordCheckStatus::Success
    };
    RecognitionOutcome { status, texts }
}

struct Shared {
    events: broadcast::Sender<RecognitionOutcome>,
    latest: Mutex<Option<RecognitionOutcome>>,
    batches: AtomicU64,
}

struct Listener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 手写识别协调器
pub struct DrawingRecognition<S: Surface + 'static> {
    pool: RecognitionWorkerPool,
    captures: Vec<SharedCapture<S>>,
    debounce: Duration,
    shared: Arc<Shared>,
    listener: Option<Listener>,
}

impl<S: Surface + 'static> DrawingRecognition<S> {
    pub fn new(pool: RecognitionWorkerPool, captures: Vec<SharedCapture<S>>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            pool,
            captures,
            debounce: config.debounce(),
            shared: Arc::new(Shared {
                events,
                latest: Mutex::new(None),
                batches: AtomicU64::new(0),
            }),
            listener: None,
        }
    }

    pub fn captures(&self) -> &[SharedCapture<S>] {
        &self.captures
    }

    pub fn pool(&self) -> &RecognitionWorkerPool {
        &self.pool
    }

    /// 订阅所有采集器的结束事件并启动监听；已绑定时不做任何事
    pub fn bind(&mut self) {
        if self.listener.is_some() {
            return;
        }
        let ends: Vec<BoxStream<'static, ()>> = self
            .captures
            .iter()
            .map(|capture| end_signals(lock(capture).subscribe()))
            .collect();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(listen(
            stream::select_all(ends),
            Debounce::new(self.debounce),
            cancel.clone(),
            self.pool.clone(),
            self.captures.clone(),
            Arc::clone(&self.shared),
        ));
        self.listener = Some(Listener { cancel, handle });
        info!("✓ 手写识别已绑定 {} 个格子", self.captures.len());
    }

    /// 停止监听并释放所有订阅
    pub async fn unbind(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        listener.cancel.cancel();
        if let Err(e) = listener.handle.await {
            warn!("⚠️ 识别监听任务异常退出: {}", e);
        }
        info!("手写识别已解绑");
    }

    pub fn is_bound(&self) -> bool {
        self.listener.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecognitionOutcome> {
        self.shared.events.subscribe()
    }

    /// 最近一次识别结果；识别进行中为 `None`
    pub fn latest(&self) -> Option<RecognitionOutcome> {
        lock(&self.shared.latest).clone()
    }

    /// 已执行的识别批次数
    pub fn batch_count(&self) -> u64 {
        self.shared.batches.load(Ordering::SeqCst)
    }

    /// 不经去抖立即识别一次
    pub async fn recognize_now(&self) -> RecognitionOutcome {
        run_batch(&self.pool, &self.captures, &self.shared).await
    }

    /// 用最近一次识别结果核对答案
    pub fn check_answer(&self, word_set: &WordSet, question_id: QuestionId) -> WordCheckStatus {
        match self.latest() {
            None => WordCheckStatus::Idle,
            Some(outcome) if outcome.status == WordCheckStatus::Failure => WordCheckStatus::Failure,
            Some(outcome) => word_set.check(question_id, &outcome.answer()),
        }
    }
}

impl<S: Surface + 'static> Drop for DrawingRecognition<S> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.cancel.cancel();
        }
    }
}

/// 只保留笔画结束信号；积压丢失时也算作一次结束
fn end_signals(rx: broadcast::Receiver<StrokeEvent>) -> BoxStream<'static, ()> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(StrokeEvent::End(_)) => return Some(((), rx)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("笔画事件积压, 跳过 {} 个", skipped);
                    return Some(((), rx));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

async fn listen<S: Surface + 'static>(
    mut ends: stream::SelectAll<BoxStream<'static, ()>>,
    mut debounce: Debounce,
    cancel: CancellationToken,
    pool: RecognitionWorkerPool,
    captures: Vec<SharedCapture<S>>,
    shared: Arc<Shared>,
) {
    let mut sources_open = true;
    loop {
        let deadline = debounce.deadline();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ended = ends.next(), if sources_open => match ended {
                Some(()) => debounce.poke(),
                None => {
                    debug!("所有采集器已关闭订阅");
                    sources_open = false;
                }
            },
            _ = Debounce::until(deadline) => {
                if !debounce.fire() {
                    continue;
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = run_batch(&pool, &captures, &shared) => {}
                }
            }
        }
        if !sources_open && !debounce.is_armed() {
            break;
        }
    }
    debug!("识别监听任务退出");
}

async fn run_batch<S: Surface>(
    pool: &RecognitionWorkerPool,
    captures: &[SharedCapture<S>],
    shared: &Shared,
) -> RecognitionOutcome {
    *lock(&shared.latest) = None;
    let batch = shared.batches.fetch_add(1, Ordering::SeqCst) + 1;

    let images: Vec<Arc<SurfaceImage>> = captures
        .iter()
        .map(|capture| Arc::new(lock(capture).snapshot()))
        .collect();
    debug!("第 {} 批识别, {} 个格子", batch, images.len());

    let outcome = match pool.recognize(&images).await {
        Ok(pages) => classify(&pages),
        Err(e) => {
            warn!("⚠️ 第 {} 批识别失败: {}", batch, e);
            RecognitionOutcome::failure()
        }
    };
    info!("识别结果: {:?} {:?}", outcome.status, outcome.texts);

    *lock(&shared.latest) = Some(outcome.clone());
    let _ = shared.events.send(outcome.clone());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::engine::mock::{MockFactory, Script};
    use crate::infrastructure::{FixedLayout, RasterSurface};
    use crate::models::WordAnswer;
    use crate::services::{OffsetPolicy, PointerEvent, StrokeRenderer};

    fn pages(texts: &[&str]) -> Vec<RecognizedPage> {
        texts.iter().map(|t| RecognizedPage::text(*t)).collect()
    }

    fn capture(size: f64) -> SharedCapture<RasterSurface> {
        let renderer = StrokeRenderer::new(
            RasterSurface::square(size, 1.0),
            RasterSurface::square(size, 1.0),
            2.0,
        );
        let mut capture = StrokeCapture::new(renderer, OffsetPolicy::BindTime);
        capture.bind(Arc::new(FixedLayout::new(0.0, 0.0)));
        Arc::new(Mutex::new(capture))
    }

    fn draw(capture: &SharedCapture<RasterSurface>) {
        let mut capture = lock(capture);
        capture.handle_event(&PointerEvent::MouseDown { offset_x: 2.0, offset_y: 2.0 });
        capture.handle_event(&PointerEvent::MouseMove { offset_x: 8.0, offset_y: 8.0 });
        capture.handle_event(&PointerEvent::MouseUp);
    }

    #[test]
    fn test_classify_repeat_char_in_one_rect() {
        let outcome = classify(&pages(&["猫", "犭苗"]));
        assert_eq!(outcome.status, WordCheckStatus::ErrorRepeatCharInOneRect);
        assert_eq!(outcome.texts, vec!["猫", "犭苗"]);

        let outcome = classify(&pages(&["猫", "苗"]));
        assert_eq!(outcome.status, WordCheckStatus::Success);
        assert_eq!(outcome.answer(), "猫苗");
    }

    #[test]
    fn test_trailing_newlines_removed() {
        assert_eq!(clean_text("猫\n"), "猫");
        assert_eq!(clean_text("猫\r\n\n"), "猫");
        assert_eq!(clean_text("\n猫"), "\n猫");

        let outcome = classify(&pages(&["猫\n", "\n", ""]));
        assert_eq!(outcome.status, WordCheckStatus::Success);
        assert_eq!(outcome.texts, vec!["猫", "", ""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stroke_end_triggers_debounced_batch() {
        let factory = Arc::new(MockFactory::new(Script::default().text(10, "猫\n").text(12, "苗")));
        let pool = RecognitionWorkerPool::new(factory, &Config::default());
        let captures = vec![capture(10.0), capture(12.0)];
        let mut coordinator = DrawingRecognition::new(pool, captures.clone(), &Config::default());
        let mut results = coordinator.subscribe();

        coordinator.bind();
        draw(&captures[0]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        draw(&captures[1]);

        let outcome = results.recv().await.unwrap();
        assert_eq!(outcome.status, WordCheckStatus::Success);
        assert_eq!(outcome.texts, vec!["猫", "苗"]);
        assert_eq!(coordinator.batch_count(), 1);
        assert_eq!(coordinator.latest(), Some(outcome));

        coordinator.unbind().await;
        assert!(!coordinator.is_bound());
        assert_eq!(lock(&captures[0]).subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_recognition_reports_failure() {
        let factory = Arc::new(MockFactory::new(Script::default().fail_on(10)));
        let pool = RecognitionWorkerPool::new(factory, &Config::default());
        let coordinator = DrawingRecognition::new(pool, vec![capture(10.0)], &Config::default());

        let outcome = coordinator.recognize_now().await;
        assert_eq!(outcome, RecognitionOutcome::failure());
    }

    #[tokio::test]
    async fn test_check_answer_uses_latest_result() {
        let factory = Arc::new(MockFactory::new(Script::default().text(10, "猫").text(12, "苗")));
        let pool = RecognitionWorkerPool::new(factory, &Config::default());
        let coordinator = DrawingRecognition::new(pool, vec![capture(10.0), capture(12.0)], &Config::default());

        let mut words = WordSet::new(1, "动物");
        words.insert(WordAnswer::new(3, "猫苗"));
        words.insert(WordAnswer::new(4, "猫"));
        assert_eq!(coordinator.check_answer(&words, 3), WordCheckStatus::Idle);

        coordinator.recognize_now().await;
        assert_eq!(coordinator.check_answer(&words, 3), WordCheckStatus::Success);
        assert_eq!(coordinator.check_answer(&words, 4), WordCheckStatus::ErrorExceedCharCount);
        assert_eq!(coordinator.check_answer(&words, 9), WordCheckStatus::ErrorNoWord);
    }
}
