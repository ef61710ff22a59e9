//! 题集模型
//!
//! 题集本身由外部（CSV 导入）生成，这里只负责保存、加载和作答检查

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::Storage;
use crate::models::path_record::QuestionId;
use crate::models::status::WordCheckStatus;

/// 题集索引在存储中的键
pub const WORD_SET_LIST_KEY: &str = "wordSetList";

/// 一道题的标准答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordAnswer {
    pub id: QuestionId,
    pub ans: String,
    pub hard: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub author: String,
    pub pinyin: String,
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addition: Option<String>,
}

impl WordAnswer {
    /// 只有答案的题目，其余字段留空
    pub fn new(id: QuestionId, ans: impl Into<String>) -> Self {
        Self {
            id,
            ans: ans.into(),
            hard: String::new(),
            kind: None,
            author: String::new(),
            pinyin: String::new(),
            desc: String::new(),
            addition: None,
        }
    }
}

/// 题集
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordSet {
    pub id: u32,
    pub name: String,
    words: BTreeMap<QuestionId, WordAnswer>,
}

impl WordSet {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            words: BTreeMap::new(),
        }
    }

    pub fn from_answers(id: u32, name: impl Into<String>, answers: Vec<WordAnswer>) -> Self {
        let mut set = Self::new(id, name);
        for answer in answers {
            set.insert(answer);
        }
        set
    }

    pub fn insert(&mut self, answer: WordAnswer) {
        self.words.insert(answer.id, answer);
    }

    pub fn get(&self, id: QuestionId) -> Option<&WordAnswer> {
        self.words.get(&id)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn question_ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.words.keys().copied()
    }

    /// 检查作答
    ///
    /// 先比较字数，再比较内容
    pub fn check(&self, id: QuestionId, ans: &str) -> WordCheckStatus {
        let Some(answer) = self.words.get(&id) else {
            return WordCheckStatus::ErrorNoWord;
        };
        let given = ans.chars().count();
        let expected = answer.ans.chars().count();

        if given > expected {
            WordCheckStatus::ErrorExceedCharCount
        } else if given < expected {
            WordCheckStatus::ErrorLessCharCount
        } else if answer.ans != ans {
            WordCheckStatus::Failure
        } else {
            WordCheckStatus::Success
        }
    }
}

/// 题集索引的持久化格式
#[derive(Debug, Serialize, Deserialize)]
struct SavedWordSet {
    id: u32,
    name: String,
    list: Vec<WordAnswer>,
}

/// 所有题集
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordSetList {
    sets: Vec<WordSet>,
}

impl WordSetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, set: WordSet) {
        self.sets.push(set);
    }

    pub fn sets(&self) -> &[WordSet] {
        &self.sets
    }

    pub fn get(&self, id: u32) -> Option<&WordSet> {
        self.sets.iter().find(|s| s.id == id)
    }

    pub fn to_json(&self) -> AppResult<String> {
        let saved: Vec<SavedWordSet> = self
            .sets
            .iter()
            .map(|s| SavedWordSet {
                id: s.id,
                name: s.name.clone(),
                list: s.words.values().cloned().collect(),
            })
            .collect();
        Ok(serde_json::to_string(&saved)?)
    }

    pub fn from_json(content: &str) -> AppResult<Self> {
        let saved: Vec<SavedWordSet> = serde_json::from_str(content)?;
        let sets = saved
            .into_iter()
            .map(|s| WordSet::from_answers(s.id, s.name, s.list))
            .collect();
        Ok(Self { sets })
    }

    pub async fn save(&self, storage: &dyn Storage) -> AppResult<()> {
        let json = self.to_json()?;
        debug!("保存题集索引: {} 个题集", self.sets.len());
        storage.write(WORD_SET_LIST_KEY, &json).await
    }

    pub async fn load(storage: &dyn Storage) -> AppResult<Self> {
        let content = storage.read(WORD_SET_LIST_KEY).await?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::MemoryStorage;

    fn answer(id: QuestionId, ans: &str) -> WordAnswer {
        WordAnswer {
            id,
            ans: ans.to_string(),
            hard: "1".to_string(),
            kind: None,
            author: "佚名".to_string(),
            pinyin: "mao".to_string(),
            desc: String::new(),
            addition: None,
        }
    }

    #[test]
    fn test_check_statuses() {
        let set = WordSet::from_answers(0, "动物", vec![answer(0, "猫咪")]);

        assert_eq!(set.check(0, "猫咪"), WordCheckStatus::Success);
        assert_eq!(set.check(0, "猫狗"), WordCheckStatus::Failure);
        assert_eq!(set.check(0, "猫"), WordCheckStatus::ErrorLessCharCount);
        assert_eq!(set.check(0, "小猫咪"), WordCheckStatus::ErrorExceedCharCount);
        assert_eq!(set.check(9, "猫咪"), WordCheckStatus::ErrorNoWord);
    }

    #[test]
    fn test_word_set_list_json() {
        let mut list = WordSetList::new();
        let mut with_type = answer(1, "苗");
        with_type.kind = Some("形声".to_string());
        list.add(WordSet::from_answers(3, "第一课", vec![answer(0, "猫"), with_type]));

        let json = list.to_json().unwrap();
        assert!(json.contains(r#""type":"形声""#));

        let back = WordSetList::from_json(&json).unwrap();
        assert_eq!(back, list);
        assert_eq!(back.get(3).map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_empty_storage_default_is_empty_list() {
        let list = WordSetList::from_json("[]").unwrap();
        assert!(list.sets().is_empty());
    }

    #[test]
    fn test_save_and_load_through_storage() {
        let storage = MemoryStorage::new();
        let mut list = WordSetList::new();
        list.add(WordSet::from_answers(1, "第二课", vec![answer(5, "永")]));

        tokio_test::block_on(async {
            let empty = tokio_test::assert_ok!(WordSetList::load(&storage).await);
            assert!(empty.sets().is_empty());

            tokio_test::assert_ok!(list.save(&storage).await);
            assert!(storage.contains(WORD_SET_LIST_KEY));

            let loaded = tokio_test::assert_ok!(WordSetList::load(&storage).await);
            assert_eq!(loaded, list);
        });
    }
}
