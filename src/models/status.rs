use serde::{Deserialize, Serialize};

/// 识别池操作的状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionStatus {
    Success,
    Failure,
    /// 要终止的 worker 不归本池管理
    WarnNotInList,
    /// 轮询识别会话不存在
    ErrorNoIntervalRecognition,
}

/// 作答检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WordCheckStatus {
    Success,
    Failure,
    /// 题集中没有该题
    ErrorNoWord,
    /// 某个格子里识别出了不止一个字
    ErrorRepeatCharInOneRect,
    /// 作答字数多于答案
    ErrorExceedCharCount,
    /// 作答字数少于答案
    ErrorLessCharCount,
    #[default]
    Idle,
}
