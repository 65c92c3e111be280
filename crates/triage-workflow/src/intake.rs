//! 签到受理
//!
//! 把自助机收集的多模态输入转换为排队记录，分配递增的排队号

use triage_core::utils::{format_queue_number, non_blank};
use triage_core::{CheckInInput, PatientRecord, PatientStatus, TriageLevel, DEFAULT_PATIENT_NAME};
use uuid::Uuid;

/// 签到受理器
///
/// 持有进程内的签到计数，每次签到（包括紧急按钮）恰好加一。
#[derive(Debug, Default)]
pub struct CheckInIntake {
    issued: u64,
}

impl CheckInIntake {
    /// 创建新的签到受理器
    pub fn new() -> Self {
        Self { issued: 0 }
    }

    /// 已签发的排队号数量
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// 下一个将要签发的排队号
    pub fn peek_next_queue_number(&self) -> String {
        format_queue_number(self.issued + 1)
    }

    /// 受理签到并追加到记录列表
    ///
    /// 不会失败：缺失或非法字段一律降级为默认值。
    pub fn check_in(
        &mut self,
        records: &mut Vec<PatientRecord>,
        input: CheckInInput,
    ) -> PatientRecord {
        self.issued += 1;
        let sequence = self.issued;

        let triage_level = match input.triage_level {
            Some(raw) => TriageLevel::from_level(raw).unwrap_or_else(|| {
                tracing::warn!(
                    "Check-in {} carried invalid triage level {}, defaulting to {}",
                    sequence,
                    raw,
                    TriageLevel::default()
                );
                TriageLevel::default()
            }),
            None => TriageLevel::default(),
        };

        let record = PatientRecord {
            id: Uuid::new_v4(),
            queue_number: format_queue_number(sequence),
            sequence,
            name: non_blank(input.name).unwrap_or_else(|| DEFAULT_PATIENT_NAME.to_string()),
            check_in_time: chrono::Utc::now(),
            symptoms: input.symptoms.unwrap_or_default(),
            voice_transcript: input.voice_transcript,
            drawing_data: input.drawing_data,
            photo_data: input.photo_data,
            triage_level,
            status: PatientStatus::Waiting,
            ai_summary: input.ai_summary,
            urgency_flag: triage_level.is_critical(),
        };

        records.push(record.clone());

        tracing::info!(
            "Checked in patient {} as #{} with triage level {}",
            record.id,
            record.queue_number,
            record.triage_level
        );
        record
    }

    /// 紧急按钮签到，走与普通签到完全相同的流程
    pub fn emergency_check_in(&mut self, records: &mut Vec<PatientRecord>) -> PatientRecord {
        tracing::warn!("Emergency button pressed at kiosk");
        self.check_in(records, CheckInInput::emergency_alert())
    }
}
