//! 识别 worker 池 - 编排层
//!
//! ## 职责
//!
//! 1. **worker 管理**：创建 / 终止 worker，并广播生命周期事件
//! 2. **任务调度**：所有 worker 从同一个任务队列取任务，空闲的 worker 先拿到下一个任务
//! 3. **保序**：一批图像的结果按输入顺序返回，与完成顺序无关
//! 4. **轮询识别**：登记和移除 `IntervalSession`
//!
//! ## 设计特点
//!
//! - worker 延迟创建：第一次识别时池里没有 worker 才创建，创建失败作为识别错误返回
//! - 只有存活的 worker 会取任务；执行中被终止的任务以 `WorkerTerminated` 失败
//! - 最后一个 worker 终止后，队列中剩余的任务以 `NoWorkers` 失败，不会一直挂起

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, RecognitionError};
use crate::infrastructure::{
    EngineFactory, RecognitionEngine, RecognitionProfile, RecognizeOptions, RecognizedPage,
    SurfaceImage,
};
use crate::models::RecognitionStatus;
use crate::orchestrator::interval_session::{IntervalSession, SessionId};
use crate::utils::lock;

pub type WorkerId = u64;

const EVENT_CAPACITY: usize = 64;

/// worker 生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Active,
    Terminating,
    Terminated,
}

/// 池事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    WorkerAdded(WorkerId),
    BeforeTerminate(WorkerId),
    AfterTerminate(WorkerId),
}

type JobResult = Result<RecognizedPage, RecognitionError>;

struct Job {
    image: Arc<SurfaceImage>,
    options: RecognizeOptions,
    reply: oneshot::Sender<JobResult>,
}

type JobQueue = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>;

/// 识别 worker 句柄
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    id: WorkerId,
    state: Mutex<WorkerState>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn new(id: WorkerId) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                id,
                state: Mutex::new(WorkerState::Created),
                cancel: CancellationToken::new(),
                handle: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.inner.id
    }

    pub fn state(&self) -> WorkerState {
        *lock(&self.inner.state)
    }

    /// 是否为同一个 worker；不同池的 worker 编号可能相同
    pub fn same_as(&self, other: &Worker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_alive(&self) -> bool {
        self.state() == WorkerState::Active
    }

    fn start(&self, engine: Box<dyn RecognitionEngine>, queue: JobQueue) {
        let handle = tokio::spawn(worker_loop(
            self.inner.id,
            engine,
            queue,
            self.inner.cancel.clone(),
        ));
        *lock(&self.inner.handle) = Some(handle);
        *lock(&self.inner.state) = WorkerState::Active;
    }

    /// 终止 worker 并等待它退出；重复调用是安全的
    async fn terminate(&self) {
        {
            let mut state = lock(&self.inner.state);
            if matches!(*state, WorkerState::Terminating | WorkerState::Terminated) {
                return;
            }
            *state = WorkerState::Terminating;
        }
        self.inner.cancel.cancel();

        let handle = lock(&self.inner.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("[worker #{}] 任务退出异常: {}", self.inner.id, e);
            }
        }
        *lock(&self.inner.state) = WorkerState::Terminated;
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

async fn worker_loop(
    id: WorkerId,
    engine: Box<dyn RecognitionEngine>,
    queue: JobQueue,
    cancel: CancellationToken,
) {
    debug!("[worker #{}] 启动", id);
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = async { queue.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        let Job { image, options, reply } = job;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = reply.send(Err(RecognitionError::WorkerTerminated(id)));
                break;
            }
            result = engine.recognize(&image, &options) => result.map_err(|e| {
                RecognitionError::EngineFailed { worker: id, message: format!("{:#}", e) }
            }),
        };

        if reply.send(outcome).is_err() {
            debug!("[worker #{}] 调用方已放弃结果", id);
        }
    }
    engine.shutdown().await;
    debug!("[worker #{}] 退出", id);
}

/// 识别 worker 池
///
/// 句柄可以廉价克隆，所有克隆共享同一组 worker 和任务队列
#[derive(Clone)]
pub struct RecognitionWorkerPool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    factory: Arc<dyn EngineFactory>,
    profile: RecognitionProfile,
    options: RecognizeOptions,
    min_interval: Duration,
    workers: Mutex<HashMap<WorkerId, Worker>>,
    job_tx: mpsc::UnboundedSender<Job>,
    job_rx: JobQueue,
    intervals: Mutex<HashMap<SessionId, IntervalSession>>,
    next_worker_id: AtomicU64,
    next_session_id: AtomicU64,
    events: broadcast::Sender<PoolEvent>,
    spawn_lock: tokio::sync::Mutex<()>,
}

impl RecognitionWorkerPool {
    /// 创建空池；worker 在 `add_worker` 或首次识别时创建
    pub fn new(factory: Arc<dyn EngineFactory>, config: &Config) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                profile: RecognitionProfile::from_config(config),
                options: RecognizeOptions::default(),
                min_interval: config.min_interval(),
                workers: Mutex::new(HashMap::new()),
                job_tx,
                job_rx: Arc::new(tokio::sync::Mutex::new(job_rx)),
                intervals: Mutex::new(HashMap::new()),
                next_worker_id: AtomicU64::new(1),
                next_session_id: AtomicU64::new(1),
                events,
                spawn_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    /// 创建池并预先启动 `config.worker_count` 个 worker
    pub async fn with_workers(factory: Arc<dyn EngineFactory>, config: &Config) -> AppResult<Self> {
        let pool = Self::new(factory, config);
        for _ in 0..config.worker_count {
            pool.add_worker().await?;
        }
        Ok(pool)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }

    pub fn profile(&self) -> &RecognitionProfile {
        &self.inner.profile
    }

    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// 创建一个 worker 并加入池和调度队列
    pub async fn add_worker(&self) -> Result<Worker, RecognitionError> {
        let id = self.inner.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let worker = Worker::new(id);

        let engine = self
            .inner
            .factory
            .create(&self.inner.profile)
            .await
            .map_err(|e| {
                error!("❌ 创建 worker #{} 失败: {:#}", id, e);
                RecognitionError::WorkerCreationFailed(format!("{:#}", e))
            })?;

        worker.start(engine, Arc::clone(&self.inner.job_rx));
        lock(&self.inner.workers).insert(id, worker.clone());
        let _ = self.inner.events.send(PoolEvent::WorkerAdded(id));
        info!(
            "✓ worker #{} 已就绪 (语言: {})",
            id,
            self.inner.profile.languages.join("+")
        );
        Ok(worker)
    }

    pub fn workers(&self) -> Vec<Worker> {
        let mut workers: Vec<Worker> = lock(&self.inner.workers).values().cloned().collect();
        workers.sort_by_key(Worker::id);
        workers
    }

    pub fn worker_count(&self) -> usize {
        lock(&self.inner.workers).len()
    }

    /// 终止 worker
    ///
    /// # 返回
    /// - `WarnNotInList`: worker 不属于本池，已直接终止，不发事件
    /// - `Success`: 已从池中移除并终止
    pub async fn terminate_worker(&self, worker: &Worker) -> RecognitionStatus {
        let managed = lock(&self.inner.workers)
            .get(&worker.id())
            .is_some_and(|member| member.same_as(worker));
        if !managed {
            worker.terminate().await;
            warn!("⚠️ worker #{} 不在池中，已直接终止", worker.id());
            return RecognitionStatus::WarnNotInList;
        }

        let _ = self.inner.events.send(PoolEvent::BeforeTerminate(worker.id()));
        lock(&self.inner.workers).remove(&worker.id());
        worker.terminate().await;
        let _ = self.inner.events.send(PoolEvent::AfterTerminate(worker.id()));
        info!("worker #{} 已终止", worker.id());

        if self.worker_count() == 0 {
            self.fail_pending_jobs().await;
        }
        RecognitionStatus::Success
    }

    async fn fail_pending_jobs(&self) {
        let mut queue = self.inner.job_rx.lock().await;
        if self.worker_count() > 0 {
            return;
        }
        let mut failed = 0;
        while let Ok(job) = queue.try_recv() {
            let _ = job.reply.send(Err(RecognitionError::NoWorkers));
            failed += 1;
        }
        if failed > 0 {
            warn!("⚠️ 池中已无 worker，{} 个排队任务失败", failed);
        }
    }

    async fn ensure_worker(&self) -> Result<(), RecognitionError> {
        if self.worker_count() > 0 {
            return Ok(());
        }
        let _guard = self.inner.spawn_lock.lock().await;
        if self.worker_count() > 0 {
            return Ok(());
        }
        info!("池中没有 worker，按需创建");
        self.add_worker().await.map(|_| ())
    }

    /// 识别一批图像，结果顺序与输入一致
    ///
    /// 任一任务失败则整批失败，不做重试
    pub async fn recognize(&self, images: &[Arc<SurfaceImage>]) -> Result<Vec<RecognizedPage>, RecognitionError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_worker().await?;

        let mut slots = Vec::with_capacity(images.len());
        for image in images {
            let (reply, slot) = oneshot::channel();
            self.inner
                .job_tx
                .send(Job {
                    image: Arc::clone(image),
                    options: self.inner.options,
                    reply,
                })
                .map_err(|_| RecognitionError::QueueClosed)?;
            slots.push(slot);
        }
        debug!("提交 {} 个识别任务", slots.len());

        try_join_all(slots.into_iter().map(|slot| async move {
            match slot.await {
                Ok(result) => result,
                Err(_) => Err(RecognitionError::NoWorkers),
            }
        }))
        .await
    }

    /// 登记轮询识别，间隔小于最小值时按最小值处理
    pub fn add_interval_recognition(&self, images: Vec<Arc<SurfaceImage>>, interval_ms: u64) -> IntervalSession {
        let interval = Duration::from_millis(interval_ms).max(self.inner.min_interval);
        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);
        let session = IntervalSession::start(id, images, interval, Arc::downgrade(&self.inner));
        lock(&self.inner.intervals).insert(id, session.clone());
        info!("⏱️ 轮询识别 #{} 已启动, 间隔 {:?}", id, interval);
        session
    }

    /// 移除轮询识别；仍在运行的会话先终止
    pub fn remove_interval_recognition(&self, id: SessionId) -> RecognitionStatus {
        self.inner.remove_interval(id)
    }

    pub fn interval(&self, id: SessionId) -> Option<IntervalSession> {
        lock(&self.inner.intervals).get(&id).cloned()
    }

    pub fn interval_count(&self) -> usize {
        lock(&self.inner.intervals).len()
    }

    /// 停止所有轮询并终止所有 worker
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = lock(&self.inner.intervals).keys().copied().collect();
        for id in ids {
            self.remove_interval_recognition(id);
        }
        for worker in self.workers() {
            self.terminate_worker(&worker).await;
        }
        info!("识别池已关闭");
    }
}

impl PoolInner {
    pub(crate) fn remove_interval(&self, id: SessionId) -> RecognitionStatus {
        let removed = lock(&self.intervals).remove(&id);
        let Some(session) = removed else {
            return RecognitionStatus::ErrorNoIntervalRecognition;
        };
        if session.is_enabled() {
            session.terminate();
        }
        debug!("轮询识别 #{} 已移除", id);
        RecognitionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::engine::mock::{MockFactory, Script};

    fn image(width: u32) -> Arc<SurfaceImage> {
        Arc::new(SurfaceImage::blank(width, 1))
    }

    fn new_pool(script: Script) -> (RecognitionWorkerPool, Arc<MockFactory>) {
        let factory = Arc::new(MockFactory::new(script));
        let pool = RecognitionWorkerPool::new(factory.clone(), &Config::default());
        (pool, factory)
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order() {
        let (pool, factory) = new_pool(
            Script::default()
                .text(1, "甲")
                .text(2, "乙")
                .text(3, "丙")
                .delay(1, 30)
                .delay(2, 10),
        );
        for _ in 0..3 {
            pool.add_worker().await.unwrap();
        }

        let pages = pool.recognize(&[image(1), image(2), image(3)]).await.unwrap();
        let texts: Vec<&str> = pages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["甲", "乙", "丙"]);

        let completed = factory.script.completed.lock().unwrap().clone();
        assert_eq!(completed.len(), 3);
        assert_eq!(completed.last(), Some(&1));
    }

    #[tokio::test]
    async fn test_worker_created_lazily() {
        let (pool, factory) = new_pool(Script::default().text(5, "猫"));
        assert_eq!(pool.worker_count(), 0);
        assert!(pool.recognize(&[]).await.unwrap().is_empty());
        assert_eq!(pool.worker_count(), 0);

        let pages = pool.recognize(&[image(5)]).await.unwrap();
        assert_eq!(pages[0].text, "猫");
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_creation_failure_is_reported() {
        let factory = Arc::new(MockFactory {
            refuse: true,
            ..Default::default()
        });
        let pool = RecognitionWorkerPool::new(factory, &Config::default());

        let err = pool.recognize(&[image(1)]).await.unwrap_err();
        assert!(matches!(err, RecognitionError::WorkerCreationFailed(_)));
    }

    #[tokio::test]
    async fn test_engine_failure_fails_batch() {
        let (pool, _) = new_pool(Script::default().text(1, "猫").fail_on(2));
        let err = pool.recognize(&[image(1), image(2)]).await.unwrap_err();
        assert!(matches!(err, RecognitionError::EngineFailed { .. }));
    }

    #[tokio::test]
    async fn test_terminate_member_emits_events() {
        let (pool, _) = new_pool(Script::default());
        let mut events = pool.subscribe();
        let worker = pool.add_worker().await.unwrap();

        assert_eq!(pool.terminate_worker(&worker).await, RecognitionStatus::Success);
        assert_eq!(worker.state(), WorkerState::Terminated);
        assert_eq!(pool.worker_count(), 0);

        assert_eq!(events.recv().await.unwrap(), PoolEvent::WorkerAdded(worker.id()));
        assert_eq!(events.recv().await.unwrap(), PoolEvent::BeforeTerminate(worker.id()));
        assert_eq!(events.recv().await.unwrap(), PoolEvent::AfterTerminate(worker.id()));
    }

    #[tokio::test]
    async fn test_terminate_foreign_worker_warns_without_events() {
        let (pool, _) = new_pool(Script::default());
        let (other, _) = new_pool(Script::default());
        let foreign = other.add_worker().await.unwrap();
        let mut events = pool.subscribe();

        assert_eq!(pool.terminate_worker(&foreign).await, RecognitionStatus::WarnNotInList);
        assert_eq!(foreign.state(), WorkerState::Terminated);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_foreign_worker_with_same_id_is_not_managed() {
        let (pool, _) = new_pool(Script::default().text(1, "猫"));
        let (other, _) = new_pool(Script::default());
        let own = pool.add_worker().await.unwrap();
        let foreign = other.add_worker().await.unwrap();
        assert_eq!(own.id(), foreign.id());
        assert!(!own.same_as(&foreign));
        let mut events = pool.subscribe();

        let status = tokio::time::timeout(Duration::from_secs(2), pool.terminate_worker(&foreign))
            .await
            .expect("terminating a foreign worker must not block");
        assert_eq!(status, RecognitionStatus::WarnNotInList);
        assert_eq!(foreign.state(), WorkerState::Terminated);
        assert!(events.try_recv().is_err());

        assert_eq!(own.state(), WorkerState::Active);
        assert_eq!(pool.worker_count(), 1);
        let pages = pool.recognize(&[image(1)]).await.unwrap();
        assert_eq!(pages[0].text, "猫");

        pool.shutdown().await;
        assert_eq!(own.state(), WorkerState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminating_busy_worker_fails_job_cleanly() {
        let (pool, _) = new_pool(Script::default().delay(1, 1_000));
        let worker = pool.add_worker().await.unwrap();

        let busy = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.recognize(&[image(1)]).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(pool.terminate_worker(&worker).await, RecognitionStatus::Success);
        let result = busy.await.unwrap();
        assert_eq!(result.unwrap_err(), RecognitionError::WorkerTerminated(worker.id()));
    }

    #[tokio::test]
    async fn test_remove_unknown_interval() {
        let (pool, _) = new_pool(Script::default());
        assert_eq!(
            pool.remove_interval_recognition(42),
            RecognitionStatus::ErrorNoIntervalRecognition
        );
    }
}
