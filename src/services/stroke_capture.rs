//! 笔画采集 - 业务能力层
//!
//! 把鼠标和多点触控事件统一成 `Start → Move* → End` 的笔画生命周期。
//!
//! ## 状态机
//!
//! ```text
//! Idle --start--> Drawing --move--> Drawing --end--> Idle
//! ```
//!
//! - 同一时刻只有一种输入方式在画；另一种方式的事件一律忽略
//! - 触控只跟踪开始笔画的那个 identifier
//! - 结束时少于两个点的笔画不提交，但会话照常结束

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::infrastructure::{page_offset, Surface, SurfaceImage, SurfaceLayout};
use crate::models::{Modality, Path, Point, Stroke};
use crate::services::stroke_renderer::StrokeRenderer;

const EVENT_CAPACITY: usize = 256;

/// 触控点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub identifier: i64,
    pub client_x: f64,
    pub client_y: f64,
}

impl TouchPoint {
    pub fn new(identifier: i64, client_x: f64, client_y: f64) -> Self {
        Self {
            identifier,
            client_x,
            client_y,
        }
    }
}

/// 原始指针事件
///
/// 鼠标坐标已是表面本地坐标；触控坐标是视口坐标，`touches` 为事件发生后仍在屏幕上的触点
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    MouseDown { offset_x: f64, offset_y: f64 },
    MouseMove { offset_x: f64, offset_y: f64 },
    MouseUp,
    MouseLeave,
    TouchStart { touches: Vec<TouchPoint> },
    TouchMove { touches: Vec<TouchPoint> },
    TouchEnd { touches: Vec<TouchPoint> },
    TouchCancel { touches: Vec<TouchPoint> },
}

/// 笔画事件
#[derive(Debug, Clone, PartialEq)]
pub enum StrokeEvent {
    Start(Modality),
    Move(Point),
    /// 完成的路径；少于两个点时为空路径
    End(Path),
}

/// 采集状态
#[derive(Debug, Clone, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Drawing {
        stroke: Stroke,
        /// 触控笔画跟踪的触点
        touch_id: Option<i64>,
    },
}

impl CaptureState {
    pub fn is_drawing(&self) -> bool {
        matches!(self, CaptureState::Drawing { .. })
    }

    pub fn modality(&self) -> Option<Modality> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Drawing { stroke, .. } => Some(stroke.modality()),
        }
    }

    fn touch_id(&self) -> Option<i64> {
        match self {
            CaptureState::Drawing { touch_id, .. } => *touch_id,
            CaptureState::Idle => None,
        }
    }
}

/// 触控坐标偏移的计算时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetPolicy {
    /// 绑定时计算一次；表面移动或页面滚动后会过期
    #[default]
    BindTime,
    /// 每个触控事件都重新计算
    PerEvent,
}

impl FromStr for OffsetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bind-time" | "bind_time" | "bindtime" => Ok(OffsetPolicy::BindTime),
            "per-event" | "per_event" | "perevent" => Ok(OffsetPolicy::PerEvent),
            other => Err(format!("未知的偏移策略: {}", other)),
        }
    }
}

/// 笔画采集器
///
/// 状态保存在 `state` 字段中，可以脱离真实输入设备单独测试
pub struct StrokeCapture<S: Surface> {
    renderer: StrokeRenderer<S>,
    state: CaptureState,
    layout: Option<Arc<dyn SurfaceLayout>>,
    offset: Point,
    policy: OffsetPolicy,
    events: broadcast::Sender<StrokeEvent>,
}

impl<S: Surface> StrokeCapture<S> {
    /// 创建未绑定的采集器，绑定前所有事件都被忽略
    pub fn new(renderer: StrokeRenderer<S>, policy: OffsetPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            renderer,
            state: CaptureState::Idle,
            layout: None,
            offset: Point::default(),
            policy,
            events,
        }
    }

    /// 绑定到页面布局，并计算表面偏移
    pub fn bind(&mut self, layout: Arc<dyn SurfaceLayout>) {
        self.layout = Some(layout);
        self.recalculate_offset();
        debug!("笔画采集已绑定, 偏移 ({}, {})", self.offset.x, self.offset.y);
    }

    /// 解除绑定：丢弃进行中的笔画并关闭所有订阅
    pub fn unbind(&mut self) {
        if self.state.is_drawing() {
            self.renderer.clear_overlay();
        }
        self.state = CaptureState::Idle;
        self.layout = None;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        // 旧的 sender 被丢弃后，所有订阅者都会收到关闭信号
        self.events = events;
        debug!("笔画采集已解绑");
    }

    pub fn is_bound(&self) -> bool {
        self.layout.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StrokeEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn policy(&self) -> OffsetPolicy {
        self.policy
    }

    pub fn recalculate_offset(&mut self) {
        if let Some(layout) = &self.layout {
            self.offset = page_offset(layout.as_ref());
        }
    }

    pub fn renderer(&self) -> &StrokeRenderer<S> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut StrokeRenderer<S> {
        &mut self.renderer
    }

    /// 当前画面
    pub fn snapshot(&self) -> SurfaceImage {
        self.renderer.snapshot()
    }

    /// 清空画面
    pub fn clear(&mut self) {
        self.renderer.clear();
    }

    /// 回放保存的路径
    pub fn replay(&mut self, paths: &[Path], original_size: Option<f64>) {
        for path in paths {
            self.renderer.draw_path(path, original_size);
        }
    }

    /// 处理一个指针事件，返回由此产生的笔画事件（同时广播给订阅者）
    pub fn handle_event(&mut self, event: &PointerEvent) -> Option<StrokeEvent> {
        if !self.is_bound() {
            return None;
        }

        let emitted = match event {
            PointerEvent::MouseDown { offset_x, offset_y } => {
                self.begin(Modality::Mouse, Point::new(*offset_x, *offset_y), None)
            }
            PointerEvent::MouseMove { offset_x, offset_y } => {
                self.extend(Modality::Mouse, Point::new(*offset_x, *offset_y))
            }
            PointerEvent::MouseUp | PointerEvent::MouseLeave => self.finish(Modality::Mouse),
            PointerEvent::TouchStart { touches } => match touches.first() {
                Some(first) if !self.state.is_drawing() => {
                    let point = self.touch_point(first);
                    self.begin(Modality::Touch, point, Some(first.identifier))
                }
                _ => None,
            },
            PointerEvent::TouchMove { touches } => {
                let tracked = self.state.touch_id();
                match touches.iter().find(|t| Some(t.identifier) == tracked) {
                    Some(touch) => {
                        let point = self.touch_point(touch);
                        self.extend(Modality::Touch, point)
                    }
                    None => None,
                }
            }
            PointerEvent::TouchEnd { touches } | PointerEvent::TouchCancel { touches } => {
                match self.state.touch_id() {
                    Some(id) if touches.iter().all(|t| t.identifier != id) => {
                        self.finish(Modality::Touch)
                    }
                    _ => None,
                }
            }
        };

        if let Some(event) = &emitted {
            // 没有订阅者时发送失败是正常的
            let _ = self.events.send(event.clone());
        }
        emitted
    }

    fn touch_point(&mut self, touch: &TouchPoint) -> Point {
        if self.policy == OffsetPolicy::PerEvent {
            self.recalculate_offset();
        }
        Point::new(touch.client_x, touch.client_y).relative_to(self.offset)
    }

    fn begin(&mut self, modality: Modality, point: Point, touch_id: Option<i64>) -> Option<StrokeEvent> {
        if self.state.is_drawing() {
            trace!("已有笔画进行中，忽略 {:?} 的开始事件", modality);
            return None;
        }
        self.state = CaptureState::Drawing {
            stroke: Stroke::begin(modality, point),
            touch_id,
        };
        Some(StrokeEvent::Start(modality))
    }

    fn extend(&mut self, modality: Modality, point: Point) -> Option<StrokeEvent> {
        let CaptureState::Drawing { stroke, .. } = &mut self.state else {
            return None;
        };
        if stroke.modality() != modality {
            return None;
        }
        if let Some(last) = stroke.last() {
            self.renderer.link_temp_path(last, point);
        }
        stroke.push(point);
        Some(StrokeEvent::Move(point))
    }

    fn finish(&mut self, modality: Modality) -> Option<StrokeEvent> {
        if self.state.modality() != Some(modality) {
            return None;
        }
        let CaptureState::Drawing { stroke, .. } = std::mem::take(&mut self.state) else {
            return None;
        };

        self.renderer.clear_overlay();
        let path = match stroke.finalize() {
            Some(path) => {
                self.renderer.draw_path(&path, None);
                path
            }
            None => Path::default(),
        };
        debug!("笔画结束: {} 个点", path.len());
        Some(StrokeEvent::End(path))
    }
}
