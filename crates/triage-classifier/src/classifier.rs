//! 分类器接口与降级处理

use anyhow::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use triage_core::utils::truncate_chars;
use triage_core::{TriageLevel, TriageRequest, TriageResult};

/// 降级摘要前缀
pub const FALLBACK_SUMMARY_PREFIX: &str = "Manual triage required. Symptoms: ";

/// 降级原因
pub const FALLBACK_REASON: &str = "AI analysis failed.";

/// 降级摘要中保留的症状字符数
const FALLBACK_SYMPTOM_CHARS: usize = 50;

/// 分诊分类器接口
#[async_trait]
pub trait TriageClassifier: Send + Sync {
    /// 分类器名称
    fn name(&self) -> &str;

    /// 对患者输入进行分诊
    async fn classify(&self, request: &TriageRequest) -> Result<TriageResult>;
}

/// 分类失败时的固定结果
pub fn fallback_result(written_symptoms: &str) -> TriageResult {
    TriageResult {
        level: TriageLevel::Urgent,
        summary: format!(
            "{}{}",
            FALLBACK_SUMMARY_PREFIX,
            truncate_chars(written_symptoms, FALLBACK_SYMPTOM_CHARS)
        ),
        is_emergency: false,
        reason: FALLBACK_REASON.to_string(),
    }
}

/// 一次分类调用的结果
#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub result: TriageResult,
    pub fallback_used: bool,
    pub failure: Option<String>,
    pub elapsed: Duration,
}

/// 调用分类器一次，出错或超时时使用降级结果
///
/// 不重试。
pub async fn classify_or_fallback(
    classifier: &dyn TriageClassifier,
    request: &TriageRequest,
    timeout: Duration,
) -> ClassificationOutcome {
    let started = Instant::now();
    debug!("Classifying symptoms with {}", classifier.name());

    let failure = match tokio::time::timeout(timeout, classifier.classify(request)).await {
        Ok(Ok(result)) => {
            debug!(
                "Classifier {} assigned level {} ({})",
                classifier.name(),
                result.level,
                result.reason
            );
            return ClassificationOutcome {
                result,
                fallback_used: false,
                failure: None,
                elapsed: started.elapsed(),
            };
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {} ms", timeout.as_millis()),
    };

    warn!(
        "AI triage analysis by {} failed: {}, using manual triage fallback",
        classifier.name(),
        failure
    );

    ClassificationOutcome {
        result: fallback_result(&request.written_symptoms),
        fallback_used: true,
        failure: Some(failure),
        elapsed: started.elapsed(),
    }
}

/// 离线分类器，每次都失败以触发人工分诊
#[derive(Debug, Default)]
pub struct DisabledClassifier;

#[async_trait]
impl TriageClassifier for DisabledClassifier {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn classify(&self, _request: &TriageRequest) -> Result<TriageResult> {
        Err(anyhow::anyhow!("AI triage is disabled"))
    }
}
