//! 轮询识别会话
//!
//! 按固定间隔反复识别同一组图像。会话只能从启用变为停用，停用后不可恢复。
//! 计时任务只持有池的弱引用，池被释放后任务自行退出。

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RecognitionError;
use crate::infrastructure::{RecognizedPage, SurfaceImage};
use crate::orchestrator::worker_pool::{PoolInner, RecognitionWorkerPool};

pub type SessionId = u64;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum IntervalEvent {
    Recognized(Vec<RecognizedPage>),
    /// 单次识别耗时超过间隔
    Drift { elapsed: Duration },
    Failed(RecognitionError),
    BeforeTerminate,
    AfterTerminate,
}

#[derive(Clone)]
pub struct IntervalSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    interval: Duration,
    images: Vec<Arc<SurfaceImage>>,
    enabled: AtomicBool,
    cancel: CancellationToken,
    events: broadcast::Sender<IntervalEvent>,
    pool: Weak<PoolInner>,
    ticks: AtomicU64,
}

impl IntervalSession {
    /// 创建会话并启动计时，第一次触发在一个间隔之后
    pub(crate) fn start(
        id: SessionId,
        images: Vec<Arc<SurfaceImage>>,
        interval: Duration,
        pool: Weak<PoolInner>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Arc::new(SessionInner {
            id,
            interval,
            images,
            enabled: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            events,
            pool,
            ticks: AtomicU64::new(0),
        });
        tokio::spawn(tick_loop(Arc::clone(&inner)));
        Self { inner }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn images(&self) -> &[Arc<SurfaceImage>] {
        &self.inner.images
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntervalEvent> {
        self.inner.events.subscribe()
    }

    /// 已执行的识别次数
    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    /// 停止会话并从所属池中注销；已停用时不做任何事
    pub fn terminate(&self) {
        if !self.inner.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.events.send(IntervalEvent::BeforeTerminate);
        self.inner.cancel.cancel();
        let _ = self.inner.events.send(IntervalEvent::AfterTerminate);
        info!("⏹️ 轮询识别 #{} 已停止", self.inner.id);
        if let Some(pool) = self.inner.pool.upgrade() {
            pool.remove_interval(self.inner.id);
        }
    }
}

impl fmt::Debug for IntervalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalSession")
            .field("id", &self.inner.id)
            .field("interval", &self.inner.interval)
            .field("enabled", &self.is_enabled())
            .field("images", &self.inner.images.len())
            .finish()
    }
}

async fn tick_loop(session: Arc<SessionInner>) {
    let period = session.interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !session.enabled.load(Ordering::SeqCst) {
            break;
        }
        let Some(inner) = session.pool.upgrade() else {
            debug!("轮询识别 #{}: 池已释放", session.id);
            break;
        };
        let pool = RecognitionWorkerPool::from_inner(inner);

        session.ticks.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => break,
            result = pool.recognize(&session.images) => result,
        };
        drop(pool);
        let elapsed = started.elapsed();

        match result {
            Ok(pages) => {
                let _ = session.events.send(IntervalEvent::Recognized(pages));
            }
            Err(e) => {
                warn!("⚠️ 轮询识别 #{} 失败: {}", session.id, e);
                let _ = session.events.send(IntervalEvent::Failed(e));
            }
        }
        if elapsed > period {
            warn!(
                "⚠️ 轮询识别 #{} 耗时 {:?} 超过间隔 {:?}",
                session.id, elapsed, period
            );
            let _ = session.events.send(IntervalEvent::Drift { elapsed });
        }
    }
    debug!("轮询识别 #{} 计时任务退出", session.id);
}
