//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责识别任务的调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `worker_pool` - 识别 worker 池
//! - 创建 / 终止 worker，广播生命周期事件
//! - 所有 worker 共享一个任务队列，空闲者先取
//! - 批量识别按输入顺序返回结果
//! - 登记和移除轮询识别
//!
//! ### `interval_session` - 轮询识别会话
//! - 固定间隔重复识别同一组图像
//! - 识别耗时超过间隔时告警
//! - 停止后自动从池中注销
//!
//! ## 层次关系
//!
//! ```text
//! workflow::DrawingRecognition (去抖触发 + 结果分类)
//!     ↓
//! orchestrator::RecognitionWorkerPool / IntervalSession
//!     ↓
//! infrastructure (识别引擎、表面、存储)
//! ```
//!
//! ## 设计原则
//!
//! 1. **只做调度**：不关心识别出的文字含义，分类交给 workflow
//! 2. **不跨 await 持锁**：簿记数据用短小的同步锁保护
//! 3. **向下依赖**：workflow → orchestrator → infrastructure

pub mod interval_session;
pub mod worker_pool;

// 重新导出主要类型
pub use interval_session::{IntervalEvent, IntervalSession, SessionId};
pub use worker_pool::{PoolEvent, RecognitionWorkerPool, Worker, WorkerId, WorkerState};
