//! # 分诊分类器模块
//!
//! 对接外部 AI 分诊服务，包括：
//! - 分类器接口，屏蔽具体模型供应商
//! - Gemini HTTP 客户端
//! - 离线模式下始终转人工分诊的分类器
//! - 调用失败或超时时的固定降级结果

pub mod classifier;
pub mod gemini;

pub use classifier::{
    classify_or_fallback, fallback_result, ClassificationOutcome, DisabledClassifier,
    TriageClassifier, FALLBACK_REASON, FALLBACK_SUMMARY_PREFIX,
};
pub use gemini::{GeminiClassifier, GeminiConfig};
