//! Gemini 分类器
//!
//! 通过 Gemini `generateContent` 接口，以 JSON schema 约束输出，完成 ESI 分诊

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use triage_core::{TriageLevel, TriageRequest, TriageResult};

use crate::classifier::TriageClassifier;

/// Gemini 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    /// HTTP 层超时，整体超时由调用方控制
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Gemini 分类器
pub struct GeminiClassifier {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClassifier {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("Gemini API key is not configured"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        info!("Initialized Gemini classifier with model {}", config.model);
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// 系统提示
pub fn system_instruction(language: &str) -> String {
    format!(
        "You are an expert ER Triage Nurse. Analyze the patient's inputs and assign a Triage Level (1-5) based on the ESI (Emergency Severity Index).\n\
         Level 1: Resuscitation (Immediate, Life-threatening)\n\
         Level 2: Emergent (High risk, confused, lethargic, severe pain)\n\
         Level 3: Urgent (Stable but requires multiple resources)\n\
         Level 4: Less Urgent (Stable, requires one resource)\n\
         Level 5: Non-Urgent (Stable, requires no resources)\n\
         \n\
         CRITICAL: Provide the 'summary' in the patient's requested language ({}).\n\
         Keep the technical 'reason' in English for staff.\n\
         Return a JSON object.",
        language
    )
}

/// 合并患者的各类输入
pub fn build_prompt(request: &TriageRequest) -> String {
    format!(
        "Language: {}\n\
         Patient's written symptoms: {}\n\
         Patient's voice transcript: {}\n\
         Description of pain location/drawing: {}",
        request.language,
        request.written_symptoms,
        request.voice_transcript.as_deref().unwrap_or("None"),
        request.drawing_description.as_deref().unwrap_or("None"),
    )
}

/// 构建 generateContent 请求体
pub fn build_request_body(request: &TriageRequest) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": system_instruction(&request.language) }]
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": build_prompt(request) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "level": { "type": "INTEGER", "description": "Triage level 1 to 5" },
                    "summary": { "type": "STRING", "description": "Clinical summary in user language" },
                    "isEmergency": { "type": "BOOLEAN", "description": "True if level 1 or 2" },
                    "reason": { "type": "STRING", "description": "Reason for this triage level assignment (English)" }
                },
                "required": ["level", "summary", "isEmergency", "reason"]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVerdict {
    level: i64,
    summary: String,
    is_emergency: bool,
    reason: String,
}

/// 解析 generateContent 响应
pub fn parse_response(body: &Value) -> Result<TriageResult> {
    let response: GenerateContentResponse =
        serde_json::from_value(body.clone()).context("Unexpected Gemini response shape")?;

    let text = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or_else(|| anyhow::anyhow!("No text in Gemini response"))?;

    let verdict: ModelVerdict =
        serde_json::from_str(text.trim()).context("Gemini returned unparsable triage JSON")?;

    let level = TriageLevel::from_level(verdict.level)
        .ok_or_else(|| anyhow::anyhow!("Gemini returned out-of-range level {}", verdict.level))?;

    Ok(TriageResult {
        level,
        summary: verdict.summary,
        is_emergency: verdict.is_emergency,
        reason: verdict.reason,
    })
}

#[async_trait]
impl TriageClassifier for GeminiClassifier {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn classify(&self, request: &TriageRequest) -> Result<TriageResult> {
        let url = self.url();
        debug!("Sending triage request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_request_body(request))
            .send()
            .await
            .context("Failed to reach Gemini")?;

        let status = response.status();
        if !status.is_success() {
            error!("Gemini request failed with status {}", status);
            return Err(anyhow::anyhow!("Gemini request failed: {}", status));
        }

        let body: Value = response.json().await.context("Failed to read Gemini response")?;
        parse_response(&body)
    }
}
