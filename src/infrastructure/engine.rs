//! 识别引擎接口 - 基础设施层
//!
//! 引擎内部的图像转文字算法对本 crate 是黑盒，这里只约定调用方式

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::infrastructure::surface::SurfaceImage;

/// 创建 worker 时使用的固定识别配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionProfile {
    pub languages: Vec<String>,
}

impl RecognitionProfile {
    pub fn from_config(config: &Config) -> Self {
        Self {
            languages: config.languages.clone(),
        }
    }
}

impl Default for RecognitionProfile {
    fn default() -> Self {
        Self {
            languages: vec!["chi_sim".to_string()],
        }
    }
}

/// 单次识别的选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecognizeOptions {
    /// 是否自动旋转；手写格子是正的，默认关闭
    pub rotate_auto: bool,
}

/// 识别结果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecognizedPage {
    pub text: String,
    pub confidence: f32,
    #[serde(default)]
    pub metadata: JsonValue,
}

impl RecognizedPage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: 100.0,
            metadata: JsonValue::Null,
        }
    }
}

/// 识别引擎实例，一个 worker 独占一个
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    async fn recognize(
        &self,
        image: &SurfaceImage,
        options: &RecognizeOptions,
    ) -> Result<RecognizedPage>;

    /// worker 退出前调用，释放引擎资源
    async fn shutdown(&self) {}
}

/// 引擎工厂
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, profile: &RecognitionProfile) -> Result<Box<dyn RecognitionEngine>>;
}
