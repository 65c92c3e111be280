//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TriageError;
use crate::utils::non_blank;

/// 未填写姓名时使用的默认患者名
pub const DEFAULT_PATIENT_NAME: &str = "Anonymous Patient";

/// 扫码或刷卡识别、但未填写姓名的患者名
pub const REGISTERED_PATIENT_NAME: &str = "Registered Patient";

/// 紧急按钮签到使用的固定姓名
pub const EMERGENCY_ALERT_NAME: &str = "CRITICAL ALERT";

/// 紧急按钮签到使用的固定症状描述
pub const EMERGENCY_ALERT_SYMPTOMS: &str = "EMERGENCY BUTTON PRESSED AT KIOSK";

/// 紧急按钮签到使用的固定摘要
pub const EMERGENCY_ALERT_SUMMARY: &str =
    "The patient pressed the emergency panic button. Needs immediate attention.";

/// 身体图标注后传给分类器的描述
pub const BODY_MAP_DESCRIPTION: &str = "Marked pain on body map";

/// 分诊级别 (ESI, Emergency Severity Index)
///
/// 1 为最严重。序列化为整数。
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum TriageLevel {
    Resuscitation = 1, // 复苏 (红)
    Emergent = 2,      // 危重 (橙)
    #[default]
    Urgent = 3, // 紧急 (黄)
    LessUrgent = 4,    // 次紧急 (绿)
    NonUrgent = 5,     // 非紧急 (蓝)
}

impl TriageLevel {
    /// 所有级别，按严重程度从高到低
    pub const ALL: [TriageLevel; 5] = [
        TriageLevel::Resuscitation,
        TriageLevel::Emergent,
        TriageLevel::Urgent,
        TriageLevel::LessUrgent,
        TriageLevel::NonUrgent,
    ];

    /// 从任意整数转换，超出 1..=5 时返回 None
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Self::Resuscitation),
            2 => Some(Self::Emergent),
            3 => Some(Self::Urgent),
            4 => Some(Self::LessUrgent),
            5 => Some(Self::NonUrgent),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 1、2 级需要加急处理
    pub fn is_critical(self) -> bool {
        self <= Self::Emergent
    }

    /// 护士看板上的标签
    pub fn label(self) -> &'static str {
        match self {
            Self::Resuscitation => "P1 - CRITICAL",
            Self::Emergent => "P2 - EMERGENT",
            Self::Urgent => "P3 - URGENT",
            Self::LessUrgent => "P4 - STABLE",
            Self::NonUrgent => "P5 - NON-URGENT",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Resuscitation => "red",
            Self::Emergent => "orange",
            Self::Urgent => "yellow",
            Self::LessUrgent => "green",
            Self::NonUrgent => "blue",
        }
    }
}

impl TryFrom<u8> for TriageLevel {
    type Error = TriageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_level(i64::from(value))
            .ok_or_else(|| TriageError::Validation(format!("Invalid triage level: {}", value)))
    }
}

impl From<TriageLevel> for u8 {
    fn from(level: TriageLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for TriageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// 患者排队状态
///
/// 只能向前推进: waiting → called → treating → completed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Waiting,   // 候诊中
    Called,    // 已叫号
    Treating,  // 治疗中
    Completed, // 已完成
}

impl PatientStatus {
    /// 状态在流程中的位置
    pub fn rank(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Called => 1,
            Self::Treating => 2,
            Self::Completed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::Treating => "treating",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(Self::Waiting),
            "called" => Ok(Self::Called),
            "treating" => Ok(Self::Treating),
            "completed" => Ok(Self::Completed),
            other => Err(TriageError::Validation(format!("Unknown patient status: {}", other))),
        }
    }
}

/// 排队中的患者记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub queue_number: String, // 患者看到的排队号
    pub sequence: u64,        // 签到序号，排队号 = 100 + sequence
    pub name: String,
    pub check_in_time: DateTime<Utc>,
    pub symptoms: String,
    pub voice_transcript: Option<String>,
    pub drawing_data: Option<String>, // Base64 画布数据
    pub photo_data: Option<String>,   // Base64 照片数据
    pub triage_level: TriageLevel,
    pub status: PatientStatus,
    pub ai_summary: Option<String>,
    pub urgency_flag: bool,
}

impl PatientRecord {
    pub fn has_voice_transcript(&self) -> bool {
        self.voice_transcript.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_body_map(&self) -> bool {
        self.drawing_data.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_photo(&self) -> bool {
        self.photo_data.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// 签到输入，所有字段均可省略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckInInput {
    pub name: Option<String>,
    pub symptoms: Option<String>,
    pub voice_transcript: Option<String>,
    pub drawing_data: Option<String>,
    pub photo_data: Option<String>,
    /// 原始分诊级别，非法值在签到时降级为默认级别
    pub triage_level: Option<i64>,
    pub ai_summary: Option<String>,
}

impl CheckInInput {
    /// 紧急按钮触发的固定签到内容
    pub fn emergency_alert() -> Self {
        Self {
            name: Some(EMERGENCY_ALERT_NAME.to_string()),
            symptoms: Some(EMERGENCY_ALERT_SYMPTOMS.to_string()),
            triage_level: Some(i64::from(TriageLevel::Resuscitation.as_u8())),
            ai_summary: Some(EMERGENCY_ALERT_SUMMARY.to_string()),
            ..Default::default()
        }
    }
}

/// 患者在自助机上的身份识别方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentificationMode {
    /// 匿名签到
    #[default]
    Anonymous,
    /// 二维码或医保卡识别
    Registered,
}

impl IdentificationMode {
    /// 未填写姓名时使用的占位名
    pub fn placeholder_name(self) -> &'static str {
        match self {
            Self::Anonymous => DEFAULT_PATIENT_NAME,
            Self::Registered => REGISTERED_PATIENT_NAME,
        }
    }
}

/// 自助机提交的原始内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskSubmission {
    pub name: Option<String>,
    pub identification: IdentificationMode,
    pub symptoms: String,
    pub voice_transcript: Option<String>,
    pub drawing_data: Option<String>,
    pub photo_data: Option<String>,
    pub language: Option<String>,
}

impl KioskSubmission {
    /// 任一输入方式有内容即可继续
    pub fn has_content(&self) -> bool {
        let filled =
            |value: &Option<String>| value.as_deref().is_some_and(|s| !s.trim().is_empty());

        !self.symptoms.trim().is_empty()
            || filled(&self.voice_transcript)
            || filled(&self.drawing_data)
            || filled(&self.photo_data)
    }

    /// 构建发给分类器的请求
    pub fn triage_request(&self, default_language: &str) -> TriageRequest {
        let drawing_description = self
            .drawing_data
            .as_deref()
            .filter(|data| !data.is_empty())
            .map(|_| BODY_MAP_DESCRIPTION.to_string());

        let language = self
            .language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .unwrap_or(default_language)
            .to_string();

        TriageRequest {
            written_symptoms: self.symptoms.clone(),
            voice_transcript: self.voice_transcript.clone().filter(|t| !t.trim().is_empty()),
            drawing_description,
            language,
        }
    }

    /// 合并分类结果，得到签到输入
    pub fn into_check_in(self, result: &TriageResult) -> CheckInInput {
        let name = non_blank(self.name)
            .unwrap_or_else(|| self.identification.placeholder_name().to_string());

        CheckInInput {
            name: Some(name),
            symptoms: Some(self.symptoms),
            voice_transcript: self.voice_transcript,
            drawing_data: self.drawing_data,
            photo_data: self.photo_data,
            triage_level: Some(i64::from(result.level.as_u8())),
            ai_summary: Some(result.summary.clone()),
        }
    }
}

/// 分类器请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    pub written_symptoms: String,
    pub voice_transcript: Option<String>,
    pub drawing_description: Option<String>,
    pub language: String,
}

/// 分类器结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub level: TriageLevel,
    pub summary: String,
    pub is_emergency: bool,
    pub reason: String,
}
