//! 按题目、按格子组织的笔迹记录

use serde::{Deserialize, Serialize};

use crate::models::stroke::Path;

/// 每道题的格子数
pub const RECT_COUNT: usize = 4;

/// 题目 ID
pub type QuestionId = u32;

/// 单个格子的笔迹：若干笔画组成一个字
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RectPathRecord {
    /// 记录时的画布尺寸，回放时用于缩放
    pub canvas_size: f64,
    pub paths: Vec<Path>,
}

/// 一道题四个格子的笔迹
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuestionPathSet {
    canvas_size: f64,
    rects: [RectPathRecord; RECT_COUNT],
}

impl QuestionPathSet {
    pub fn new(canvas_size: f64) -> Self {
        let mut set = Self::default();
        set.set_canvas_size(canvas_size);
        for rect in set.rects.iter_mut() {
            rect.canvas_size = canvas_size;
        }
        set
    }

    /// 最近一次写入时使用的画布尺寸
    pub fn canvas_size(&self) -> f64 {
        self.canvas_size
    }

    pub fn rect(&self, index: usize) -> Option<&RectPathRecord> {
        self.rects.get(index)
    }

    pub(crate) fn rect_mut(&mut self, index: usize) -> Option<&mut RectPathRecord> {
        self.rects.get_mut(index)
    }

    pub fn rects(&self) -> &[RectPathRecord] {
        &self.rects
    }

    /// 所有格子的笔画总数
    pub fn stroke_count(&self) -> usize {
        self.rects.iter().map(|r| r.paths.len()).sum()
    }

    pub(crate) fn set_canvas_size(&mut self, canvas_size: f64) {
        self.canvas_size = canvas_size;
    }
}

/// 持久化格式：`{canvasSize, path: Path[4][]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPaths {
    pub canvas_size: f64,
    pub path: [Vec<Path>; RECT_COUNT],
}

impl From<&QuestionPathSet> for SavedPaths {
    fn from(set: &QuestionPathSet) -> Self {
        Self {
            canvas_size: set.canvas_size,
            path: set.rects.clone().map(|rect| rect.paths),
        }
    }
}

impl From<SavedPaths> for QuestionPathSet {
    fn from(saved: SavedPaths) -> Self {
        let canvas_size = saved.canvas_size;
        Self {
            canvas_size,
            rects: saved.path.map(|paths| RectPathRecord { canvas_size, paths }),
        }
    }
}
