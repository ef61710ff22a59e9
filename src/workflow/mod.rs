//! 工作流层
//!
//! - `debounce`: 尾沿去抖
//! - `drawing_recognition`: 把笔画采集器接到识别池，去抖后批量识别并分类

pub mod debounce;
pub mod drawing_recognition;

pub use debounce::Debounce;
pub use drawing_recognition::{classify, clean_text, DrawingRecognition, RecognitionOutcome, SharedCapture};
