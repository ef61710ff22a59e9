//! # Word Test
//!
//! 手写笔迹采集与识别：把指针事件变成笔画，保存、回放，并交给识别 worker 池批量识别
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露能力，不含业务判断
//! - `Surface` / `RasterSurface` - 可绘制表面和位图实现
//! - `Storage` / `FileStorage` - 键值存储
//! - `RecognitionEngine` / `EngineFactory` - 识别引擎接口
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 针对单个格子的能力
//! - `StrokeCapture` - 指针事件 → 笔画状态机
//! - `StrokeRenderer` - 实时反馈和完整路径绘制
//! - `PathStore` - 题目 → 格子 → 笔画 的存储与回放
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/worker_pool` - 识别 worker 池，负载均衡并保序
//! - `orchestrator/interval_session` - 轮询识别
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/drawing_recognition` - 笔画结束 → 去抖 → 批量识别 → 结果分类
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, RecognitionError};
pub use infrastructure::{EngineFactory, FileStorage, RasterSurface, RecognitionEngine, Storage};
pub use models::{Path, Point, RecognitionStatus, WordCheckStatus, WordSet};
pub use orchestrator::{IntervalSession, RecognitionWorkerPool};
pub use services::{PathStore, StrokeCapture, StrokeRenderer};
pub use workflow::{DrawingRecognition, RecognitionOutcome};
