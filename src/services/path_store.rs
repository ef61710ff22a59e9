//! 笔迹存储 - 业务能力层
//!
//! 在内存中按"题目 → 格子 → 笔画"保存路径，并负责与外部存储之间的序列化。
//! 每道题在存储中占一个键 `answer-<题目ID>`，值为以题目 ID 为键的 JSON 对象：
//!
//! ```text
//! {"3": {"canvasSize": 300.0, "path": [[[[x, y], ...], ...], [], [], []]}}
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::infrastructure::{Storage, Surface};
use crate::models::{Path, QuestionId, QuestionPathSet, SavedPaths, RECT_COUNT};
use crate::services::stroke_renderer::StrokeRenderer;

/// 题目笔迹在存储中的键
pub fn answer_key(question_id: QuestionId) -> String {
    format!("answer-{}", question_id)
}

/// 从存储键中解析题目 ID
pub fn question_id_from_key(key: &str) -> Option<QuestionId> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^answer-(\d+)$").expect("valid pattern"));
    pattern.captures(key)?.get(1)?.as_str().parse().ok()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PathStore {
    questions: BTreeMap<QuestionId, QuestionPathSet>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_mut(&mut self, question_id: QuestionId, canvas_size: f64) -> &mut QuestionPathSet {
        self.questions
            .entry(question_id)
            .or_insert_with(|| QuestionPathSet::new(canvas_size))
    }

    fn check_rect(rect: usize) -> AppResult<()> {
        if rect >= RECT_COUNT {
            return Err(AppError::rect_out_of_range(rect, RECT_COUNT - 1));
        }
        Ok(())
    }

    /// 清空某个格子的笔迹
    pub fn clear_path(&mut self, question_id: QuestionId, rect: usize, canvas_size: f64) -> AppResult<()> {
        Self::check_rect(rect)?;
        let set = self.record_mut(question_id, canvas_size);
        set.set_canvas_size(canvas_size);
        if let Some(record) = set.rect_mut(rect) {
            record.canvas_size = canvas_size;
            record.paths.clear();
        }
        Ok(())
    }

    /// 向某个格子追加一笔
    pub fn push_path(
        &mut self,
        question_id: QuestionId,
        rect: usize,
        canvas_size: f64,
        path: Path,
    ) -> AppResult<()> {
        Self::check_rect(rect)?;
        let set = self.record_mut(question_id, canvas_size);
        set.set_canvas_size(canvas_size);
        if let Some(record) = set.rect_mut(rect) {
            record.canvas_size = canvas_size;
            record.paths.push(path);
        }
        Ok(())
    }

    pub fn question(&self, question_id: QuestionId) -> Option<&QuestionPathSet> {
        self.questions.get(&question_id)
    }

    /// 某个格子的所有笔画，不存在时为空
    pub fn paths(&self, question_id: QuestionId, rect: usize) -> &[Path] {
        self.questions
            .get(&question_id)
            .and_then(|set| set.rect(rect))
            .map(|record| record.paths.as_slice())
            .unwrap_or(&[])
    }

    pub fn question_ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.questions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn serialize(&self) -> AppResult<String> {
        let saved: BTreeMap<QuestionId, SavedPaths> = self
            .questions
            .iter()
            .map(|(id, set)| (*id, SavedPaths::from(set)))
            .collect();
        Ok(serde_json::to_string(&saved)?)
    }

    /// 反序列化；存储的默认值 `"[]"` 视为空
    pub fn deserialize(content: &str) -> AppResult<Self> {
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            return Ok(Self::default());
        }
        let saved: BTreeMap<QuestionId, SavedPaths> = serde_json::from_str(trimmed)?;
        Ok(Self {
            questions: saved.into_iter().map(|(id, s)| (id, s.into())).collect(),
        })
    }

    fn serialize_question(&self, question_id: QuestionId) -> AppResult<Option<String>> {
        let Some(set) = self.questions.get(&question_id) else {
            return Ok(None);
        };
        let single = BTreeMap::from([(question_id, SavedPaths::from(set))]);
        Ok(Some(serde_json::to_string(&single)?))
    }

    /// 把所有题目的笔迹写入存储，返回写入的题目数
    pub async fn flush(&self, storage: &dyn Storage) -> AppResult<usize> {
        let mut written = 0;
        for &question_id in self.questions.keys() {
            if let Some(json) = self.serialize_question(question_id)? {
                storage.write(&answer_key(question_id), &json).await?;
                written += 1;
            }
        }
        info!("💾 已保存 {} 道题的笔迹", written);
        Ok(written)
    }

    /// 进入题目时加载笔迹，返回是否存在保存的记录
    pub async fn load_question(&mut self, storage: &dyn Storage, question_id: QuestionId) -> AppResult<bool> {
        let content = storage.read(&answer_key(question_id)).await?;
        let mut loaded = Self::deserialize(&content)?;
        match loaded.questions.remove(&question_id) {
            Some(set) => {
                debug!("加载题目 {} 的笔迹: {} 笔", question_id, set.stroke_count());
                self.questions.insert(question_id, set);
                Ok(true)
            }
            None => {
                self.questions.remove(&question_id);
                Ok(false)
            }
        }
    }

    /// 删除题目及其持久化记录
    pub async fn remove_question(&mut self, storage: &dyn Storage, question_id: QuestionId) -> AppResult<bool> {
        storage.delete(&answer_key(question_id)).await?;
        Ok(self.questions.remove(&question_id).is_some())
    }

    /// 把某个格子的笔迹按记录时的尺寸回放到渲染器上，返回笔画数
    pub fn replay_into<S: Surface>(
        &self,
        question_id: QuestionId,
        rect: usize,
        renderer: &mut StrokeRenderer<S>,
    ) -> usize {
        let Some(record) = self.questions.get(&question_id).and_then(|set| set.rect(rect)) else {
            return 0;
        };
        for path in &record.paths {
            renderer.draw_path(path, Some(record.canvas_size));
        }
        record.paths.len()
    }
}
